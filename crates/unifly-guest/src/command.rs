// Station manager commands
//
// Request bodies for `POST /api/s/{site}/cmd/stamgr`. The controller
// expects every value as a string, so numbers are rendered up front.

use serde::Serialize;

/// `cmd` value for guest authorization.
pub const AUTHORIZE_GUEST: &str = "authorize-guest";

/// Optional quality-of-service caps for a guest. Zero means "no limit" and
/// leaves the key out of the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuestLimits {
    /// Download rate cap in Kbps.
    pub down_kbps: u32,
    /// Upload rate cap in Kbps.
    pub up_kbps: u32,
    /// Data transfer quota in MB.
    pub quota_mb: u32,
}

/// `authorize-guest` command envelope.
///
/// ```json
/// { "cmd": "authorize-guest", "mac": "aa:bb:cc:dd:ee:ff", "minutes": "60",
///   "down": "2048", "up": "512", "bytes": "1024" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestAuthorization {
    cmd: &'static str,
    mac: String,
    minutes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    down: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    up: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<String>,
}

impl GuestAuthorization {
    /// `mac` is the client address in `aa:bb:cc:dd:ee:ff` form; it is sent
    /// as given.
    pub fn new(mac: impl Into<String>, minutes: u32, limits: GuestLimits) -> Self {
        Self {
            cmd: AUTHORIZE_GUEST,
            mac: mac.into(),
            minutes: minutes.to_string(),
            down: positive(limits.down_kbps),
            up: positive(limits.up_kbps),
            bytes: positive(limits.quota_mb),
        }
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn minutes(&self) -> &str {
        &self.minutes
    }
}

fn positive(value: u32) -> Option<String> {
    (value > 0).then(|| value.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn zero_limits_are_omitted() {
        let cmd = GuestAuthorization::new("aa:bb:cc:dd:ee:ff", 5, GuestLimits::default());
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({
                "cmd": "authorize-guest",
                "mac": "aa:bb:cc:dd:ee:ff",
                "minutes": "5",
            })
        );
    }

    #[test]
    fn download_limit_is_a_string() {
        let limits = GuestLimits {
            down_kbps: 2048,
            ..GuestLimits::default()
        };
        let cmd = GuestAuthorization::new("aa:bb:cc:dd:ee:ff", 60, limits);
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({
                "cmd": "authorize-guest",
                "mac": "aa:bb:cc:dd:ee:ff",
                "minutes": "60",
                "down": "2048",
            })
        );
    }

    #[test]
    fn all_limits_map_to_controller_keys() {
        let limits = GuestLimits {
            down_kbps: 4096,
            up_kbps: 1024,
            quota_mb: 500,
        };
        let value = serde_json::to_value(GuestAuthorization::new("11:22:33:44:55:66", 1440, limits))
            .unwrap();
        assert_eq!(value["down"], "4096");
        assert_eq!(value["up"], "1024");
        assert_eq!(value["bytes"], "500");
        assert_eq!(value.as_object().unwrap().len(), 6);
    }
}
