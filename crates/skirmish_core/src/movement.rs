//! Move orders and arrival detection.
//!
//! Movement owns intent only: a target and a moving flag. Physics turns
//! intent into velocity and raises `just_arrived`; [`collect_arrivals`]
//! consumes that flag once, so each arrival is reported exactly once.

use serde::{Deserialize, Serialize};

use crate::components::{ComponentKind, EntityId};
use crate::math::Vec3Fixed;
use crate::registry::Registry;

/// Movement lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementEvent {
    /// A move order was accepted.
    Started {
        /// Moving entity.
        entity: EntityId,
        /// Destination, with Y pinned to the entity's height.
        target: Vec3Fixed,
    },
    /// The entity reached its destination.
    Arrived {
        /// Arrived entity.
        entity: EntityId,
    },
}

/// Give `id` a move target. Returns `None` if the entity cannot move.
///
/// The target's Y is replaced with the entity's own Y; movement is planar.
pub fn move_to(registry: &mut Registry, id: EntityId, target: Vec3Fixed) -> Option<MovementEvent> {
    let entity = registry.get_mut(id).filter(|e| e.is_interactive())?;
    let target = Vec3Fixed::new(target.x, entity.position.y, target.z);
    let movement = entity.movement_mut()?;
    movement.target = Some(target);
    movement.moving = true;
    movement.just_arrived = false;
    Some(MovementEvent::Started { entity: id, target })
}

/// Cancel any move order. Returns `false` if the entity cannot move.
pub fn stop(registry: &mut Registry, id: EntityId) -> bool {
    let Some(movement) = registry
        .get_mut(id)
        .filter(|e| e.is_live())
        .and_then(|e| e.movement_mut())
    else {
        return false;
    };
    movement.target = None;
    movement.moving = false;
    true
}

/// Consume arrival flags raised by physics, in entity-ID order.
pub fn collect_arrivals(registry: &mut Registry) -> Vec<MovementEvent> {
    let mut events = Vec::new();
    for id in registry.query_all(&[ComponentKind::Movement]) {
        let Some(movement) = registry.get_mut(id).and_then(|e| e.movement_mut()) else {
            continue;
        };
        if movement.just_arrived {
            movement.just_arrived = false;
            events.push(MovementEvent::Arrived { entity: id });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Movement;
    use crate::math::Fixed;
    use crate::registry::Entity;

    fn registry_with_mover() -> Registry {
        let mut registry = Registry::new();
        registry
            .add(
                Entity::new(1, Vec3Fixed::from_ints(0, 2, 0))
                    .with_movement(Movement::new(Fixed::from_num(3))),
            )
            .unwrap();
        registry.add(Entity::new(2, Vec3Fixed::ZERO)).unwrap();
        registry
    }

    #[test]
    fn test_move_pins_height() {
        let mut registry = registry_with_mover();
        let event = move_to(&mut registry, 1, Vec3Fixed::from_ints(5, 9, 5)).unwrap();
        assert_eq!(
            event,
            MovementEvent::Started {
                entity: 1,
                target: Vec3Fixed::from_ints(5, 2, 5)
            }
        );
        assert!(registry.get(1).unwrap().movement().unwrap().has_active_target());
    }

    #[test]
    fn test_move_rejects_immobile_or_missing() {
        let mut registry = registry_with_mover();
        assert!(move_to(&mut registry, 2, Vec3Fixed::ZERO).is_none());
        assert!(move_to(&mut registry, 42, Vec3Fixed::ZERO).is_none());
        assert!(!stop(&mut registry, 2));
    }

    #[test]
    fn test_arrival_consumed_once() {
        let mut registry = registry_with_mover();
        registry
            .get_mut(1)
            .unwrap()
            .movement_mut()
            .unwrap()
            .just_arrived = true;

        assert_eq!(
            collect_arrivals(&mut registry),
            vec![MovementEvent::Arrived { entity: 1 }]
        );
        assert!(collect_arrivals(&mut registry).is_empty());
    }

    #[test]
    fn test_stop_clears_target() {
        let mut registry = registry_with_mover();
        move_to(&mut registry, 1, Vec3Fixed::from_ints(3, 0, 3)).unwrap();
        assert!(stop(&mut registry, 1));
        let movement = registry.get(1).unwrap().movement().unwrap();
        assert!(!movement.moving);
        assert!(movement.target.is_none());
    }
}
