//! Aliyun Drive endpoint constants and refresh tuning
//!
//! Endpoint URLs for the three credential families and the profile reads.
//! These identify the public service, not secrets — the actual token
//! material lives in the credential store. The open-API OAuth endpoint is
//! the only one an operator may override (see `settings`).

use std::time::Duration;

/// Primary account token endpoint (refresh_token grant)
pub const TOKEN_ENDPOINT: &str = "https://auth.aliyundrive.com/v2/account/token";

/// Default open-API OAuth endpoint; `OpenApiSettings::oauth_url` may override it
pub const OPEN_API_TOKEN_ENDPOINT: &str = "https://open.aliyundrive.com/oauth/access_token";

/// Device session creation endpoint (session credential)
pub const SESSION_ENDPOINT: &str =
    "https://api.aliyundrive.com/users/v1/users/device/create_session";

/// Personal space / plan info
pub const PERSONAL_INFO_ENDPOINT: &str =
    "https://api.aliyundrive.com/v2/databox/get_personal_info";

/// VIP tier listing
pub const VIP_INFO_ENDPOINT: &str = "https://api.aliyundrive.com/business/v1.0/users/vip/info";

/// Albums (media) drive info
pub const ALBUMS_INFO_ENDPOINT: &str = "https://api.aliyundrive.com/adrive/v1/user/albums_info";

/// Monthly sign-in calendar
pub const SIGN_IN_LIST_ENDPOINT: &str =
    "https://member.aliyundrive.com/v1/activity/sign_in_list";

/// Sign-in reward claim
pub const SIGN_IN_REWARD_ENDPOINT: &str =
    "https://member.aliyundrive.com/v1/activity/sign_in_reward";

/// Device name reported when creating a session
pub const SESSION_DEVICE_NAME: &str = "Edge浏览器";

/// Model name reported when creating a session
pub const SESSION_MODEL_NAME: &str = "Windows网页版";

/// Remote body code meaning the stored refresh token itself is invalid.
/// This is the terminal classification: the account must re-authenticate.
pub const INVALID_REFRESH_TOKEN_CODE: &str = "InvalidParameter.RefreshToken";

/// Remote body code for open-API rate limiting
pub const RATE_LIMITED_CODE: &str = "429";

/// Displayed tier name when no VIP entry is currently valid
pub const FREE_TIER_NAME: &str = "免费用户";

/// Minimum spacing between real network refreshes of the session credential
pub const SESSION_COOLDOWN: Duration = Duration::from_secs(60);

/// Minimum spacing between real network refreshes of the primary credential
pub const PRIMARY_COOLDOWN: Duration = Duration::from_secs(300);

/// Minimum spacing between real network refreshes of the open-API credential
pub const OPEN_API_COOLDOWN: Duration = Duration::from_secs(180);

/// Issuing-origin tag written on the record after a primary refresh
pub const TOKEN_FROM_ACCOUNT: &str = "account";

/// Store value key holding the preferred default account id
pub const DEFAULT_ACCOUNT_KEY: &str = "default_account";
