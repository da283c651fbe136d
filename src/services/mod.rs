pub mod gaze_backend;
pub mod http_backend;
