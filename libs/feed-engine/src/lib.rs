use std::collections::VecDeque;

use tokio::sync::{RwLock, mpsc};

use feed_api::{CrashRecord, FeedEntry, FeedError, Marker, OverflowPolicy};

// ═══════════════════════════════════════════════════════════════
//  Subscriber
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
struct Subscriber {
    tx: mpsc::Sender<FeedEntry>,
    overflow: OverflowPolicy,
}

// ═══════════════════════════════════════════════════════════════
//  FeedSubscription
// ═══════════════════════════════════════════════════════════════

/// Живая подписка на feed: mpsc-канал с выбранной overflow policy.
pub struct FeedSubscription {
    rx: mpsc::Receiver<FeedEntry>,
}

impl FeedSubscription {
    pub async fn recv(&mut self) -> Option<FeedEntry> {
        self.rx.recv().await
    }
}

// ═══════════════════════════════════════════════════════════════
//  LiveFeed
// ═══════════════════════════════════════════════════════════════

/// Bounded FIFO-проекция внешнего потока крушений.
///
/// Одна упорядоченная последовательность [`FeedEntry`] (запись +
/// маркер), insertion order = arrival order. После append при
/// превышении capacity вытесняется ровно один старейший элемент.
/// Писатель один (listener), читатели — HTTP handlers; append и
/// eviction выполняются под одним write lock.
#[derive(Debug)]
pub struct LiveFeed {
    capacity: usize,
    entries: RwLock<VecDeque<FeedEntry>>,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Result<Self, FeedError> {
        if capacity == 0 {
            return Err(FeedError::config("feed capacity must be positive"));
        }
        Ok(Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(65536))),
            subscribers: RwLock::new(Vec::new()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Подписаться на новые записи feed'а.
    pub async fn subscribe(&self, buffer: usize, overflow: OverflowPolicy) -> FeedSubscription {
        let (tx, rx) = mpsc::channel(buffer);
        let mut subs = self.subscribers.write().await;
        subs.push(Subscriber { tx, overflow });
        FeedSubscription { rx }
    }

    /// Опубликовать запись: append + conditional evict → notify subscribers.
    pub async fn publish(&self, entry: FeedEntry) {
        {
            let mut buf = self.entries.write().await;
            buf.push_back(entry.clone());
            if buf.len() > self.capacity {
                buf.pop_front();
            }
        }

        // Под локом — только try_send и сбор back-pressure отправок:
        // awaited send на полном канале держал бы лок и блокировал
        // subscribe() новых клиентов, пока медленный не вычитает.
        let mut pending: Vec<mpsc::Sender<FeedEntry>> = Vec::new();
        {
            let mut subs = self.subscribers.write().await;
            let mut i = 0;
            while i < subs.len() {
                let sub = &subs[i];
                if sub.tx.is_closed() {
                    subs.swap_remove(i);
                    continue;
                }
                match sub.overflow {
                    OverflowPolicy::Drop => match sub.tx.try_send(entry.clone()) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::warn!("feed subscriber channel full, dropping");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            subs.swap_remove(i);
                            continue;
                        }
                    },
                    OverflowPolicy::BackPressure => pending.push(sub.tx.clone()),
                }
                i += 1;
            }
        }

        for tx in pending {
            // закрывшийся подписчик будет вычищен на следующем publish
            let _ = tx.send(entry.clone()).await;
        }
    }

    /// Упорядоченная копия живой последовательности.
    pub async fn snapshot(&self) -> Vec<FeedEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Проекция записей (для list view).
    pub async fn records(&self) -> Vec<CrashRecord> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| e.record.clone())
            .collect()
    }

    /// Проекция маркеров (для карты).
    pub async fn markers(&self) -> Vec<Marker> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| e.marker.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
