pub mod csv_store;
pub mod dry_run;
pub mod feishu;
pub mod local;
pub mod lookup;
pub mod token_cache;

pub use csv_store::{ColumnAliases, CsvStore};
pub use dry_run::DryRunStore;
pub use feishu::FeishuStore;
pub use local::LocalStorage;
pub use lookup::DanjuanLookup;
pub use token_cache::{Clock, SystemClock, TokenCache};
