pub mod bus_handlers;
pub mod bus_stop_handlers;
pub mod company_handlers;
pub mod executive_handlers;
pub mod health_handlers;
pub mod landmark_handlers;
pub mod picture_handlers;
pub mod route_handlers;
pub mod search;
pub mod token_handlers;
