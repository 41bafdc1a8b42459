pub mod fallback;
pub mod paths;
pub mod primary;
pub mod raw;

pub use fallback::extract_fallback;
pub use primary::{extract_primary, locate_payloads};
pub use raw::{Lookup, RawMapping, RawView};
