use crate::error::SessionError;

pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

pub(crate) fn window() -> Result<web_sys::Window, SessionError> {
    web_sys::window().ok_or(SessionError::NoWindow)
}

pub(crate) fn document() -> Result<web_sys::Document, SessionError> {
    window()?.document().ok_or(SessionError::NoDocument)
}
