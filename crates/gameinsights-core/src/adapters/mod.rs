mod gamalytic;
mod howlongtobeat;
mod protondb;
mod static_source;
mod steamachievements;
mod steamcharts;
mod steamreview;
mod steamspy;
mod steamstore;
mod steamuser;
mod support;

pub use gamalytic::GamalyticAdapter;
pub use howlongtobeat::HowLongToBeatAdapter;
pub use protondb::ProtonDbAdapter;
pub use static_source::StaticSource;
pub use steamachievements::SteamAchievementsAdapter;
pub use steamcharts::SteamChartsAdapter;
pub use steamreview::SteamReviewAdapter;
pub use steamspy::SteamSpyAdapter;
pub use steamstore::SteamStoreAdapter;
pub use steamuser::{OwnedGame, RecentGame, SteamUserAdapter, UserProfile};
