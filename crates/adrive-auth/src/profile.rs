//! Profile fetchers
//!
//! Idempotent remote reads that populate derived profile fields on a
//! record: storage quota, VIP tier, media-drive id, and the daily sign-in
//! (with its dependent reward claim). No locking — callers run the read
//! fetchers concurrently and repeated calls simply overwrite the same
//! fields. Each fetcher needs a non-empty account id and is only invoked
//! while a primary access token is present.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::constants::{
    ALBUMS_INFO_ENDPOINT, FREE_TIER_NAME, PERSONAL_INFO_ENDPOINT, SIGN_IN_LIST_ENDPOINT,
    SIGN_IN_REWARD_ENDPOINT, VIP_INFO_ENDPOINT,
};
use crate::format::{human_datetime, human_size};
use crate::messaging::Messenger;
use crate::record::CredentialRecord;
use crate::refresh::now_millis;
use crate::transport::{Transport, is_success};

/// Storage quota and plan fields from the personal-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceInfo {
    pub used_size: u64,
    pub total_size: u64,
    pub spu_id: String,
    pub plan_name: String,
    pub plan_expired: bool,
}

/// Chosen VIP tier: the entry with the furthest future expiry, or the
/// free-tier sentinel when nothing is currently valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipInfo {
    pub vip_name: String,
    pub vip_expire: String,
}

#[derive(Debug, Default, Deserialize)]
struct PersonalInfoResponse {
    #[serde(default)]
    personal_space_info: PersonalSpaceInfo,
    #[serde(default)]
    personal_rights_info: PersonalRightsInfo,
}

#[derive(Debug, Default, Deserialize)]
struct PersonalSpaceInfo {
    #[serde(default)]
    used_size: u64,
    #[serde(default)]
    total_size: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PersonalRightsInfo {
    #[serde(default)]
    spu_id: String,
    #[serde(default)]
    is_expires: bool,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct VipInfoResponse {
    #[serde(default, rename = "vipList")]
    vip_list: Vec<VipEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct VipEntry {
    #[serde(default)]
    name: String,
    /// Expiry as unix seconds
    #[serde(default)]
    expire: i64,
}

#[derive(Debug, Default, Deserialize)]
struct SignInResult {
    #[serde(default, rename = "signInCount")]
    sign_in_count: u64,
    #[serde(default, rename = "signInLogs")]
    sign_in_logs: Vec<SignInLog>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct SignInLog {
    #[serde(default)]
    status: String,
    #[serde(default, rename = "isReward")]
    is_reward: bool,
    #[serde(default)]
    reward: SignInReward,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct SignInReward {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

/// Today's entry in the sign-in calendar: the one immediately before the
/// first `"miss"`. A miss at index 0 means nothing is signed yet; a
/// calendar with no miss at all is fully signed, so the last entry is
/// today's.
fn todays_sign_in(logs: &[SignInLog]) -> Option<&SignInLog> {
    match logs.iter().position(|log| log.status == "miss") {
        Some(0) => None,
        Some(i) => logs.get(i - 1),
        None => logs.last(),
    }
}

/// Read-only profile client over the remote service.
pub struct ProfileClient {
    transport: Arc<dyn Transport>,
    messenger: Arc<dyn Messenger>,
}

impl ProfileClient {
    pub fn new(transport: Arc<dyn Transport>, messenger: Arc<dyn Messenger>) -> Self {
        Self { transport, messenger }
    }

    /// Storage quota and plan info.
    pub async fn fetch_space(&self, user_id: &str) -> Option<SpaceInfo> {
        if user_id.is_empty() {
            return None;
        }
        let resp = match self
            .transport
            .post(PERSONAL_INFO_ENDPOINT, json!({}), user_id)
            .await
        {
            Ok(resp) if is_success(resp.code) => resp,
            Ok(resp) => {
                warn!(user_id, code = resp.code, "personal info fetch failed");
                return None;
            }
            Err(e) => {
                warn!(user_id, error = %e, "personal info fetch failed");
                return None;
            }
        };
        let parsed: PersonalInfoResponse = serde_json::from_value(resp.body).ok()?;
        Some(SpaceInfo {
            used_size: parsed.personal_space_info.used_size,
            total_size: parsed.personal_space_info.total_size,
            spu_id: parsed.personal_rights_info.spu_id,
            plan_name: parsed.personal_rights_info.name,
            plan_expired: parsed.personal_rights_info.is_expires,
        })
    }

    /// VIP tier with the furthest future expiry, or the free-tier sentinel.
    pub async fn fetch_vip(&self, user_id: &str) -> Option<VipInfo> {
        if user_id.is_empty() {
            return None;
        }
        let resp = match self.transport.post(VIP_INFO_ENDPOINT, json!({}), user_id).await {
            Ok(resp) if is_success(resp.code) => resp,
            Ok(resp) => {
                warn!(user_id, code = resp.code, "vip info fetch failed");
                return None;
            }
            Err(e) => {
                warn!(user_id, error = %e, "vip info fetch failed");
                return None;
            }
        };
        let parsed: VipInfoResponse = serde_json::from_value(resp.body).ok()?;
        let best = parsed.vip_list.iter().max_by_key(|entry| entry.expire);
        let now_secs = (now_millis() / 1000) as i64;
        Some(match best {
            Some(entry) if entry.expire > now_secs => VipInfo {
                vip_name: entry.name.clone(),
                vip_expire: human_datetime(entry.expire),
            },
            _ => VipInfo {
                vip_name: FREE_TIER_NAME.into(),
                vip_expire: String::new(),
            },
        })
    }

    /// Media (albums) drive id.
    pub async fn fetch_album_drive(&self, user_id: &str) -> Option<String> {
        if user_id.is_empty() {
            return None;
        }
        let resp = match self
            .transport
            .post(ALBUMS_INFO_ENDPOINT, json!({}), user_id)
            .await
        {
            Ok(resp) if is_success(resp.code) => resp,
            Ok(resp) => {
                warn!(user_id, code = resp.code, "albums info fetch failed");
                return None;
            }
            Err(e) => {
                warn!(user_id, error = %e, "albums info fetch failed");
                return None;
            }
        };
        resp.body
            .get("data")
            .and_then(|d| d.get("driveId"))
            .and_then(|id| id.as_str())
            .map(str::to_owned)
    }

    /// Daily sign-in plus the dependent reward claim.
    ///
    /// A failed reward claim surfaces a message but does not fail the
    /// sign-in itself.
    pub async fn sign_in(&self, user_id: &str) -> bool {
        if user_id.is_empty() {
            return false;
        }
        let resp = match self
            .transport
            .post(SIGN_IN_LIST_ENDPOINT, json!({}), user_id)
            .await
        {
            Ok(resp) if is_success(resp.code) => resp,
            Ok(resp) => {
                self.messenger.error(&format!(
                    "签到失败{}",
                    resp.body_message().unwrap_or_default()
                ));
                return false;
            }
            Err(e) => {
                warn!(user_id, error = %e, "sign-in request failed");
                self.messenger.error("签到失败");
                return false;
            }
        };

        let result: SignInResult = match resp.body.get("result") {
            Some(result) => match serde_json::from_value(result.clone()) {
                Ok(result) => result,
                Err(e) => {
                    warn!(user_id, error = %e, "malformed sign-in result");
                    self.messenger.error("签到失败");
                    return false;
                }
            },
            None => {
                self.messenger.error(&format!(
                    "签到失败{}",
                    resp.body_message().unwrap_or_default()
                ));
                return false;
            }
        };

        let today = todays_sign_in(&result.sign_in_logs);
        let reward_text = match today {
            Some(log) if log.is_reward => {
                format!("获得{} {}", log.reward.name, log.reward.description)
            }
            _ => "无奖励".to_string(),
        };

        if today.is_some_and(|log| log.is_reward) {
            let claim = self
                .transport
                .post(
                    SIGN_IN_REWARD_ENDPOINT,
                    json!({"signInDay": result.sign_in_count}),
                    user_id,
                )
                .await;
            match claim {
                Ok(resp) if is_success(resp.code) => {
                    if resp.body.get("result").is_none() {
                        self.messenger.error(&format!(
                            "签到后领取奖励失败，请前往手机端领取{}",
                            resp.body_message().unwrap_or_default()
                        ));
                    }
                }
                Ok(resp) => {
                    warn!(user_id, code = resp.code, "sign-in reward claim failed");
                }
                Err(e) => {
                    warn!(user_id, error = %e, "sign-in reward claim failed");
                }
            }
        }

        self.messenger.info(&format!(
            "本月累计签到{}次，本次签到 {}",
            result.sign_in_count, reward_text
        ));
        true
    }

    /// Run the three read fetchers concurrently and apply what succeeded.
    ///
    /// A partially populated profile is acceptable: individual failures
    /// leave the corresponding fields stale. Returns whether all three
    /// reads succeeded.
    pub async fn refresh_profile(&self, record: &mut CredentialRecord) -> bool {
        if record.user_id.is_empty() || record.access_token.is_empty() {
            return false;
        }
        let user_id = record.user_id.clone();
        let (space, vip, album_drive) = tokio::join!(
            self.fetch_space(&user_id),
            self.fetch_vip(&user_id),
            self.fetch_album_drive(&user_id),
        );

        let all = space.is_some() && vip.is_some() && album_drive.is_some();

        if let Some(space) = space {
            record.used_size = space.used_size;
            record.total_size = space.total_size;
            record.spu_id = space.spu_id;
            record.plan_name = space.plan_name;
            record.plan_expired = space.plan_expired;
            record.space_info = format!(
                "{} / {}",
                human_size(record.used_size),
                human_size(record.total_size)
            );
        }
        if let Some(vip) = vip {
            record.vip_name = vip.vip_name;
            record.vip_expire = vip.vip_expire;
        }
        if let Some(album_drive) = album_drive {
            record.album_drive_id = album_drive;
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::NullMessenger;
    use crate::testutil::{MockTransport, RecordingMessenger};

    fn client(transport: Arc<MockTransport>) -> ProfileClient {
        ProfileClient::new(transport, Arc::new(NullMessenger))
    }

    fn personal_info_body() -> serde_json::Value {
        json!({
            "personal_space_info": {"used_size": 1536, "total_size": 1073741824u64},
            "personal_rights_info": {"spu_id": "spu-1", "is_expires": false, "name": "basic"}
        })
    }

    #[tokio::test]
    async fn fetch_space_parses_quota_and_plan() {
        let transport =
            Arc::new(MockTransport::new().respond(PERSONAL_INFO_ENDPOINT, 200, personal_info_body()));
        let space = client(transport).fetch_space("u1").await.unwrap();
        assert_eq!(space.used_size, 1536);
        assert_eq!(space.total_size, 1073741824);
        assert_eq!(space.spu_id, "spu-1");
        assert_eq!(space.plan_name, "basic");
        assert!(!space.plan_expired);
    }

    #[tokio::test]
    async fn fetchers_require_account_id() {
        let transport = Arc::new(MockTransport::new());
        let c = client(transport.clone());
        assert!(c.fetch_space("").await.is_none());
        assert!(c.fetch_vip("").await.is_none());
        assert!(c.fetch_album_drive("").await.is_none());
        assert!(!c.sign_in("").await);
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn fetch_vip_picks_furthest_future_expiry() {
        let future_far = (now_millis() / 1000) as i64 + 86_400 * 30;
        let future_near = (now_millis() / 1000) as i64 + 86_400;
        let transport = Arc::new(MockTransport::new().respond(
            VIP_INFO_ENDPOINT,
            200,
            json!({"vipList": [
                {"name": "vip", "expire": future_near},
                {"name": "svip", "expire": future_far},
            ]}),
        ));
        let vip = client(transport).fetch_vip("u1").await.unwrap();
        assert_eq!(vip.vip_name, "svip");
        assert!(!vip.vip_expire.is_empty());
    }

    #[tokio::test]
    async fn fetch_vip_falls_back_to_free_tier() {
        let past = (now_millis() / 1000) as i64 - 86_400;
        let transport = Arc::new(MockTransport::new().respond(
            VIP_INFO_ENDPOINT,
            200,
            json!({"vipList": [{"name": "vip", "expire": past}]}),
        ));
        let vip = client(transport).fetch_vip("u1").await.unwrap();
        assert_eq!(vip.vip_name, FREE_TIER_NAME);
        assert_eq!(vip.vip_expire, "");

        let transport =
            Arc::new(MockTransport::new().respond(VIP_INFO_ENDPOINT, 200, json!({"vipList": []})));
        let vip = client(transport).fetch_vip("u1").await.unwrap();
        assert_eq!(vip.vip_name, FREE_TIER_NAME);
    }

    #[tokio::test]
    async fn fetch_album_drive_reads_drive_id() {
        let transport = Arc::new(MockTransport::new().respond(
            ALBUMS_INFO_ENDPOINT,
            200,
            json!({"data": {"driveId": "album-drive-9"}}),
        ));
        let id = client(transport).fetch_album_drive("u1").await;
        assert_eq!(id.as_deref(), Some("album-drive-9"));
    }

    #[test]
    fn todays_sign_in_is_entry_before_first_miss() {
        let logs = vec![
            SignInLog { status: "normal".into(), is_reward: false, ..Default::default() },
            SignInLog { status: "normal".into(), is_reward: true, ..Default::default() },
            SignInLog { status: "miss".into(), ..Default::default() },
        ];
        let today = todays_sign_in(&logs).unwrap();
        assert!(today.is_reward);
    }

    #[test]
    fn miss_at_index_zero_means_no_sign_in_yet() {
        let logs = vec![
            SignInLog { status: "miss".into(), ..Default::default() },
            SignInLog { status: "miss".into(), ..Default::default() },
        ];
        assert!(todays_sign_in(&logs).is_none());
    }

    #[test]
    fn fully_signed_month_uses_last_entry() {
        let logs = vec![
            SignInLog { status: "normal".into(), is_reward: false, ..Default::default() },
            SignInLog { status: "normal".into(), is_reward: true, ..Default::default() },
        ];
        let today = todays_sign_in(&logs).unwrap();
        assert!(today.is_reward);
    }

    #[test]
    fn empty_calendar_has_no_entry() {
        assert!(todays_sign_in(&[]).is_none());
    }

    #[tokio::test]
    async fn sign_in_with_reward_claims_it() {
        let transport = Arc::new(
            MockTransport::new()
                .respond(
                    SIGN_IN_LIST_ENDPOINT,
                    200,
                    json!({"result": {
                        "signInCount": 5,
                        "signInLogs": [
                            {"status": "normal", "isReward": true,
                             "reward": {"name": "容量", "description": "1GB"}},
                            {"status": "miss"},
                        ]
                    }}),
                )
                .respond(SIGN_IN_REWARD_ENDPOINT, 200, json!({"result": {"ok": true}})),
        );
        let messenger = Arc::new(RecordingMessenger::default());
        let c = ProfileClient::new(transport.clone(), messenger.clone());

        assert!(c.sign_in("u1").await);
        assert_eq!(transport.calls_to(SIGN_IN_REWARD_ENDPOINT), 1);
        let infos = messenger.infos.lock().unwrap();
        assert_eq!(infos.len(), 1);
        assert!(infos[0].contains("签到5次") || infos[0].contains("5次"), "got {}", infos[0]);
        assert!(infos[0].contains("容量"), "got {}", infos[0]);
    }

    #[tokio::test]
    async fn sign_in_without_reward_skips_claim() {
        let transport = Arc::new(MockTransport::new().respond(
            SIGN_IN_LIST_ENDPOINT,
            200,
            json!({"result": {
                "signInCount": 2,
                "signInLogs": [
                    {"status": "normal", "isReward": false},
                    {"status": "miss"},
                ]
            }}),
        ));
        let messenger = Arc::new(RecordingMessenger::default());
        let c = ProfileClient::new(transport.clone(), messenger.clone());

        assert!(c.sign_in("u1").await);
        assert_eq!(transport.calls_to(SIGN_IN_REWARD_ENDPOINT), 0);
        let infos = messenger.infos.lock().unwrap();
        assert!(infos[0].contains("无奖励"), "got {}", infos[0]);
    }

    #[tokio::test]
    async fn sign_in_failure_surfaces_error() {
        let transport = Arc::new(MockTransport::new().respond(
            SIGN_IN_LIST_ENDPOINT,
            500,
            json!({"message": "server busy"}),
        ));
        let messenger = Arc::new(RecordingMessenger::default());
        let c = ProfileClient::new(transport, messenger.clone());

        assert!(!c.sign_in("u1").await);
        let errors = messenger.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("签到失败"), "got {}", errors[0]);
    }

    #[tokio::test]
    async fn refresh_profile_applies_partial_results() {
        // Space succeeds, vip and albums fail: quota fields update, the
        // rest stay stale, and the overall result is false.
        let transport =
            Arc::new(MockTransport::new().respond(PERSONAL_INFO_ENDPOINT, 200, personal_info_body()));
        let c = client(transport);

        let mut rec = CredentialRecord::for_user("u1");
        rec.access_token = "at".into();
        rec.vip_name = "stale-vip".into();

        assert!(!c.refresh_profile(&mut rec).await);
        assert_eq!(rec.used_size, 1536);
        assert_eq!(rec.space_info, "1.50KB / 1.00GB");
        assert_eq!(rec.vip_name, "stale-vip");
    }

    #[tokio::test]
    async fn refresh_profile_requires_access_token() {
        let transport = Arc::new(MockTransport::new());
        let c = client(transport.clone());
        let mut rec = CredentialRecord::for_user("u1");
        assert!(!c.refresh_profile(&mut rec).await);
        assert_eq!(transport.total_calls(), 0);
    }
}
