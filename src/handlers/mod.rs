pub mod admin;
pub mod bookings;
pub mod calendar;
pub mod health;
pub mod inquiries;
pub mod season;
pub mod webhook;
