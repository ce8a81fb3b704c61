//! Time tag conversion tests

use oscar_core::TimeTag;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DAY: u64 = 24 * 60 * 60;

#[test]
fn test_end_of_1999() {
    // 1999-12-31T00:00:00Z
    let time = UNIX_EPOCH + Duration::from_secs(946_598_400);
    let tag = TimeTag::from_system_time(time);
    assert_eq!(tag.seconds(), 0xBC16_7080);
    assert_eq!(tag.fraction(), 0);
    assert_eq!(tag.to_system_time_in_era(0), time);
}

#[test]
fn test_end_of_2036_is_era_one() {
    // 2036-12-31T00:00:00Z
    let time = UNIX_EPOCH + Duration::from_secs(2_114_294_400);
    let tag = TimeTag::from_system_time(time);
    assert_eq!(tag.seconds(), 0x01B0_1100);
    assert_eq!(tag.to_system_time_in_era(1), time);
    assert_ne!(tag.to_system_time_in_era(0), time);
}

#[test]
fn test_era_chosen_near_reference() {
    // Shortly after the 2036 rollover, a small seconds value belongs to era 1
    let rollover = UNIX_EPOCH + Duration::from_secs(2_085_978_496);
    let tag = TimeTag::from_system_time(rollover + Duration::from_secs(DAY));
    assert!(tag.seconds() < 100_000);
    assert_eq!(
        tag.to_system_time_near(rollover),
        rollover + Duration::from_secs(DAY)
    );

    // Just before the rollover, a large seconds value stays in era 0
    let before = TimeTag::from_system_time(rollover - Duration::from_secs(DAY));
    assert_eq!(
        before.to_system_time_near(rollover + Duration::from_secs(DAY)),
        rollover - Duration::from_secs(DAY)
    );
}

#[test]
fn test_subsecond_precision() {
    let time = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
    let back = TimeTag::from_system_time(time).to_system_time_near(time);
    let error = match back.duration_since(time) {
        Ok(d) => d,
        Err(e) => e.duration(),
    };
    assert!(error <= Duration::from_nanos(1));
}

#[test]
fn test_now_roundtrip() {
    let now = SystemTime::now();
    let tag = TimeTag::from_system_time(now);
    let back = tag.to_system_time();
    let error = match back.duration_since(now) {
        Ok(d) => d,
        Err(e) => e.duration(),
    };
    assert!(error < Duration::from_micros(1));
}

#[test]
fn test_after() {
    let tag = TimeTag::after(Duration::from_secs(60)).unwrap();
    let delay = tag.delay_from(SystemTime::now()).unwrap();
    assert!(delay > Duration::from_secs(59) && delay < Duration::from_secs(60) + Duration::from_millis(1));
}

#[test]
fn test_after_out_of_range() {
    assert_eq!(TimeTag::after(Duration::MAX), None);
    assert_eq!(TimeTag::after(Duration::from_secs(u64::MAX)), None);
}

#[test]
fn test_display() {
    assert_eq!(TimeTag::IMMEDIATE.to_string(), "immediate");
    assert_eq!(TimeTag::from_parts(5, 0x8000_0000).to_string(), "5.80000000");
}

#[test]
fn test_serde_transparent() {
    let tag = TimeTag::from_parts(1, 2);
    let json = serde_json::to_string(&tag).unwrap();
    assert_eq!(json, ((1u64 << 32) | 2).to_string());
    let back: TimeTag = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tag);
}
