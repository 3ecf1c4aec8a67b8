//! Emergency alert payload composition

use safewalk_shared::message::{
    AndroidConfig, AndroidNotification, AndroidPriority, ApnsConfig, ApnsPayload, Aps,
    InterruptionLevel, MulticastMessage, Notification, NotificationPriority,
};
use safewalk_shared::model::coordinate_string;
use serde_json::Value;
use std::collections::BTreeMap;

pub const ALERT_TITLE: &str = "🚨 ALERTA SOS";
pub const ALERT_TYPE: &str = "emergency_alert";
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";
pub const ANDROID_CHANNEL_ID: &str = "emergency_channel";
pub const DEFAULT_SOUND: &str = "default";

pub fn alert_body(user_name: &str) -> String {
    format!("¡{} necesita ayuda! Ve la ubicación en tiempo real", user_name)
}

/// Build the SOS multicast for `tokens`
pub fn emergency_alert(
    event_id: &str,
    user_id: &str,
    user_name: &str,
    lat: &Value,
    lng: &Value,
    tokens: Vec<String>,
) -> MulticastMessage {
    let alert = Notification {
        title: ALERT_TITLE.into(),
        body: alert_body(user_name),
    };

    let data = BTreeMap::from([
        ("type".to_string(), ALERT_TYPE.to_string()),
        ("userId".to_string(), user_id.to_string()),
        ("userName".to_string(), user_name.to_string()),
        ("lat".to_string(), coordinate_string(lat)),
        ("lng".to_string(), coordinate_string(lng)),
        ("eventId".to_string(), event_id.to_string()),
        ("click_action".to_string(), CLICK_ACTION.to_string()),
    ]);

    MulticastMessage {
        tokens,
        notification: alert.clone(),
        data,
        android: AndroidConfig {
            priority: AndroidPriority::High,
            notification: AndroidNotification {
                channel_id: ANDROID_CHANNEL_ID.into(),
                notification_priority: NotificationPriority::Max,
                sound: DEFAULT_SOUND.into(),
                default_sound: true,
                default_vibrate_timings: true,
            },
        },
        apns: ApnsConfig {
            payload: ApnsPayload {
                aps: Aps {
                    alert,
                    sound: DEFAULT_SOUND.into(),
                    badge: 1,
                    interruption_level: InterruptionLevel::Critical,
                },
            },
        },
    }
}
