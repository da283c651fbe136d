pub mod analysis;
pub mod calibration;
pub mod capture;
pub mod codec;
pub mod config;
pub mod constants;
pub mod logging;
pub mod middleware;
pub mod overlay;
pub mod presentation;
pub mod resources;
pub mod response;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod stimulus;
pub mod tracking;
pub mod types;
