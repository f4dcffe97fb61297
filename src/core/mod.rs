//! Core bow-tie geocoding modules

pub mod quadtree;
pub mod scan;
pub mod stripe;
pub mod swath;
pub mod tiepoint;

// Re-export main types
pub use quadtree::QuadTreeLocator;
pub use scan::StripeGeoCoding;
pub use stripe::{CenterLine, Stripe, StripeBuilder, SwathStripes};
pub use swath::{GeoCoding, SwathPixelGeoCoding};
pub use tiepoint::{GridLayout, SwathTiePointGeoCoding, TiePointGrid};
