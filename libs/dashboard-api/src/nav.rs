use serde::Serialize;

// ═══════════════════════════════════════════════════════════════
//  Navigation state
// ═══════════════════════════════════════════════════════════════

/// Таблица маршрутов меню. Один view — crashes.
const ROUTES: &[(&str, &str)] = &[("/crashes", "Crashes")];

/// Путь единственного view и цель fallback-редиректа.
pub const CRASHES_PATH: &str = "/crashes";

/// Активен ли пункт меню: чистое равенство кандидата и текущего пути.
pub fn is_active(candidate: &str, current: &str) -> bool {
    candidate == current
}

/// Пункт меню для view state.
#[derive(Debug, Clone, Serialize)]
pub struct NavItem {
    pub path: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// Меню с проставленными active-флагами для текущего пути.
pub fn menu(current: &str) -> Vec<NavItem> {
    ROUTES
        .iter()
        .map(|&(path, label)| NavItem {
            path,
            label,
            active: is_active(path, current),
        })
        .collect()
}
