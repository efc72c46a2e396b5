pub mod clock;
#[cfg(feature = "postgres")]
pub mod schema;
pub mod state;
#[cfg(test)]
pub mod test_utils;
#[cfg(feature = "postgres")]
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(feature = "postgres")]
pub use utils::{create_conn, DbPool};
