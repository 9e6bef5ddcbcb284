pub mod coordinate;
pub mod itinerary;
pub mod preferences;
pub mod route;
pub mod session;
pub mod proximity;
pub mod announcement;
pub mod speech;
pub mod notify;
pub mod navigator;
