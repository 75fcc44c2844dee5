pub mod booking;
pub mod calendar;
pub mod inquiry;

pub use booking::{Booking, BookingEvent, BookingStatus, PaymentKind, TransitionError};
pub use calendar::{month_range, months_between, CalendarDay, DayStatus, Season};
pub use inquiry::{InquiryStatus, SeasonalCode, SeasonalInquiry};
