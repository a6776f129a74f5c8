use serde::Serialize;

use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::identity::{Identity, Role};

/// Whether this viewer is allowed to see this delivery at all.
pub fn can_view(viewer: &Identity, delivery: &Delivery) -> bool {
    match viewer.role {
        Role::SuperAdmin | Role::Admin => true,
        Role::Rider => delivery
            .rider
            .as_ref()
            .is_some_and(|snapshot| snapshot.id == viewer.id),
        Role::Vendor => delivery.vendor_id == Some(viewer.id),
        Role::Customer => delivery.customer.phone == viewer.phone,
    }
}

/// Archive membership: terminal states only. Everything else is live work.
pub fn is_archived(status: DeliveryStatus) -> bool {
    matches!(status, DeliveryStatus::Delivered | DeliveryStatus::Failed)
}

/// The two mutually-exclusive partitions of a viewer's visible deliveries;
/// each visible delivery appears in exactly one.
#[derive(Debug, Serialize)]
pub struct DeliveryBoard {
    pub live_queue: Vec<Delivery>,
    pub archive: Vec<Delivery>,
}

pub fn board(viewer: &Identity, all: Vec<Delivery>) -> DeliveryBoard {
    let mut visible: Vec<Delivery> = all
        .into_iter()
        .filter(|delivery| can_view(viewer, delivery))
        .collect();
    visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

    let (archive, live_queue): (Vec<Delivery>, Vec<Delivery>) = visible
        .into_iter()
        .partition(|delivery| is_archived(delivery.status));

    DeliveryBoard {
        live_queue,
        archive,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::delivery::{CustomerInfo, PaymentStatus, RiderSnapshot, TransportMode};

    fn delivery(seed: u128, status: DeliveryStatus, phone: &str) -> Delivery {
        Delivery {
            id: Uuid::from_u128(seed),
            customer: CustomerInfo {
                id: None,
                name: "Customer".to_string(),
                phone: phone.to_string(),
            },
            rider: None,
            vendor_id: None,
            pickup_address: "A".to_string(),
            dropoff_address: "B".to_string(),
            package_notes: None,
            transport_mode: TransportMode::Bike,
            status,
            payment_status: PaymentStatus::Unpaid,
            price: 1500.0,
            estimated_minutes: 20,
            created_at: Utc::now() - Duration::minutes(seed as i64),
            delivered_at: None,
            updated_at: None,
        }
    }

    fn viewer(role: Role, phone: &str) -> Identity {
        let mut identity = Identity::new("Viewer", phone, role, "1234");
        identity.id = Uuid::from_u128(999);
        identity.active = true;
        identity
    }

    #[test]
    fn customers_match_on_phone_not_identity() {
        // del-104 carries the viewer's phone, del-101 does not.
        let del_101 = delivery(101, DeliveryStatus::Pending, "08000000000");
        let del_104 = delivery(104, DeliveryStatus::Pending, "08012345674");
        let customer = viewer(Role::Customer, "08012345674");

        assert!(!can_view(&customer, &del_101));
        assert!(can_view(&customer, &del_104));
    }

    #[test]
    fn riders_see_only_their_assigned_deliveries() {
        let rider = viewer(Role::Rider, "0802");
        let mut assigned = delivery(1, DeliveryStatus::Assigned, "0800");
        assigned.rider = Some(RiderSnapshot {
            id: rider.id,
            name: rider.name.clone(),
            phone: rider.phone.clone(),
            picture: None,
        });
        let unassigned = delivery(2, DeliveryStatus::Pending, "0800");

        assert!(can_view(&rider, &assigned));
        assert!(!can_view(&rider, &unassigned));
    }

    #[test]
    fn vendors_see_their_own_orders_and_admins_see_everything() {
        let vendor = viewer(Role::Vendor, "0803");
        let mut own = delivery(1, DeliveryStatus::Pending, "0800");
        own.vendor_id = Some(vendor.id);
        let foreign = delivery(2, DeliveryStatus::Pending, "0800");

        assert!(can_view(&vendor, &own));
        assert!(!can_view(&vendor, &foreign));

        let admin = viewer(Role::Admin, "0801");
        assert!(can_view(&admin, &own));
        assert!(can_view(&admin, &foreign));
    }

    #[test]
    fn every_visible_delivery_lands_in_exactly_one_partition() {
        let admin = viewer(Role::SuperAdmin, "0801");
        let all = vec![
            delivery(1, DeliveryStatus::Pending, "a"),
            delivery(2, DeliveryStatus::Assigned, "b"),
            delivery(3, DeliveryStatus::PickedUp, "c"),
            delivery(4, DeliveryStatus::InTransit, "d"),
            delivery(5, DeliveryStatus::Delivered, "e"),
            delivery(6, DeliveryStatus::Failed, "f"),
        ];
        let total = all.len();

        let board = board(&admin, all);
        assert_eq!(board.live_queue.len() + board.archive.len(), total);
        assert!(board.live_queue.iter().all(|d| !is_archived(d.status)));
        assert!(board.archive.iter().all(|d| is_archived(d.status)));
        assert_eq!(board.archive.len(), 2);
    }

    #[test]
    fn boards_order_newest_first() {
        let admin = viewer(Role::Admin, "0801");
        // Seeds double as age: higher seed = older creation time.
        let board = board(
            &admin,
            vec![
                delivery(3, DeliveryStatus::Pending, "a"),
                delivery(1, DeliveryStatus::Pending, "b"),
                delivery(2, DeliveryStatus::Pending, "c"),
            ],
        );

        let ids: Vec<Uuid> = board.live_queue.iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]
        );
    }
}
