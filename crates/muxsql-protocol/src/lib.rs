pub mod messages;
pub mod mock;
pub mod plan_cache;
pub mod transport;

pub use messages::Request;
pub use mock::{MockServer, MockTransport};
pub use plan_cache::{PlanCache, PlanCacheRegistry, PlanEntry, PlanOptions, ShardingInfo, StatementCache};
pub use transport::{Connector, Transport};
