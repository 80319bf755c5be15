pub mod booking;
pub mod draft;
pub mod service;
pub mod voucher;

pub use booking::{Booking, NewBooking, PaymentStatus};
pub use draft::{BookingStep, DraftBooking};
pub use service::{ServiceDefinition, ServiceType};
