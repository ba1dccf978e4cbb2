//! Route path constants, shared by the router and the API smoke test.

pub const HEALTH: &str = "/health";
pub const READYZ: &str = "/readyz";
pub const DOCS: &str = "/docs";

pub const ACCOUNT_TOKEN: &str = "/entebus/account/token";
pub const ACCOUNT: &str = "/entebus/account";
pub const ACCOUNT_PICTURE: &str = "/entebus/account/picture";

pub const LANDMARK: &str = "/landmark";
pub const BUS_STOP: &str = "/landmark/bus_stop";

pub const COMPANY: &str = "/company";
pub const ROUTE: &str = "/company/route";
pub const LANDMARK_IN_ROUTE: &str = "/company/route/landmark";
pub const BUS: &str = "/company/bus";
