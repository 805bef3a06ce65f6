//! Database Models

pub mod listing;
pub mod offer;
pub mod order;
pub mod payout;
pub mod policy;
pub mod review;
pub mod user;

pub use listing::{Listing, ListingCreate, ListingStatus};
pub use offer::{Offer, OfferCreate, OfferStatus};
pub use order::{Order, OrderEvent, OrderWithTimeline, ShipmentStatus};
pub use payout::Payout;
pub use policy::{Policy, PolicyAcceptance, PolicyCreate};
pub use review::{Review, ReviewCreate};
pub use user::{RecoveryCode, User, UserCreate, UserPublic, UserStatus};
