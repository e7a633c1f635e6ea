use chrono::TimeZone;
use classwatch_domain::{CatalogDimension, NameDirectory, NotificationObligation, User};
use classwatch_infra::NotificationMessage;

/// Render one obligation into the message handed to the delivery channel.
/// Ids are resolved to display names through the cached catalog where known;
/// a stale catalog degrades to showing the raw id.
pub fn render_notification(
    user: &User,
    obligation: &NotificationObligation,
    names: &NameDirectory,
) -> NotificationMessage {
    let instance = &obligation.instance;
    let local_start = instance.local_start();

    let club = names
        .resolve(CatalogDimension::Clubs, &instance.club_id)
        .unwrap_or(&instance.club_id);
    let zone = names
        .resolve(CatalogDimension::Zones, &instance.zone_id)
        .unwrap_or(&instance.zone_id);
    let class_type = names
        .resolve(CatalogDimension::ClassTypes, &instance.class_type_id)
        .unwrap_or(&instance.class_type_id);

    let mut text = format!("Free spot found for a class!\n\n{}\n", instance.name);
    text.push_str(&format!("Club: {}\n", club));
    text.push_str(&format!("Zone: {}\n", zone));
    text.push_str(&format!("Type: {}\n", class_type));
    if let Some(trainer_id) = &instance.trainer_id {
        let trainer = names
            .resolve(CatalogDimension::Trainers, trainer_id)
            .unwrap_or(trainer_id);
        text.push_str(&format!("Trainer: {}\n", trainer));
    }
    text.push_str(&format!(
        "When: {}",
        local_start.format("%A, %d.%m.%Y %H:%M")
    ));
    if instance.duration > 0 {
        let local_end = instance.timezone.timestamp_millis(instance.end_ts());
        text.push_str(&format!(" - {}", local_end.format("%H:%M")));
    }
    text.push_str(&format!("\nFree spots: {}", instance.free_spots));

    NotificationMessage {
        address: user.delivery_address.clone(),
        text,
    }
}
