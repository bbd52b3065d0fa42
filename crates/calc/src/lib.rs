pub mod address;
pub mod logging;
pub mod metrics;
pub mod page;
pub mod render;
pub mod session;
pub mod source;
pub mod testing;

pub use address::{AddressError, Authority, MIN_ADDRESS_LEN};
pub use page::{CollateralControl, Notice, Page, PageStatus, PerpRow, PriceControl, Severity, SpotRow};
pub use render::{Calculator, RenderError, RenderRequest};
pub use session::{SessionId, SessionState, SessionStore, SharedSession, StartSessionError, WidgetKey};
pub use source::{AccountSource, RiskModel, SourceError};
