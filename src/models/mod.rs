pub mod booking;
pub mod profile;
pub mod review;
pub mod service;
pub mod transaction;
pub mod vendor;
pub mod wallet;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use profile::{Profile, Role};
pub use review::{Review, ReviewStatus};
pub use service::{Service, ServiceCategory};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use vendor::{Vendor, VendorStatus};
pub use wallet::{Wallet, WalletStats, PLATFORM_WALLET};
