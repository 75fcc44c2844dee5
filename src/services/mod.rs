pub mod availability;
pub mod booking;
pub mod calendar;
pub mod email;
pub mod gcal;
pub mod guesty;
pub mod ics;
pub mod payments;
pub mod pricing;
pub mod season;
pub mod seasonal;
pub mod token;
