//! Status publisher: builds snapshots and event notifications
//!
//! Status is always retained, events never are. Both go through the bridge,
//! so publishing while offline is silently dropped.

use tracing::info;

use crate::config::PropConfig;
use crate::core::bridge::{Channel, NetworkBridge};
use crate::core::outputs::OutputController;
use crate::core::sensors::SensorEngine;
use crate::hal::Transport;
use crate::types::{
    ChangeSource, EventMessage, Millis, OutputDetail, PropState, SensorDetail, StatusDetails,
    StatusSnapshot,
};

#[derive(Debug, Clone)]
pub struct StatusPublisher {
    prop_id: String,
    name: String,
}

impl StatusPublisher {
    pub fn new(prop_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { prop_id: prop_id.into(), name: name.into() }
    }

    pub fn from_config(config: &PropConfig) -> Self {
        Self::new(&config.identity.device_id, &config.identity.device_name)
    }

    pub fn prop_id(&self) -> &str {
        &self.prop_id
    }

    /// Snapshot of the prop as it stands
    pub fn snapshot(
        &self,
        state: &PropState,
        sensors: &SensorEngine,
        outputs: &OutputController,
        now: Millis,
        online: bool,
    ) -> StatusSnapshot {
        self.build(
            state.solved_latched,
            state.last_change_source,
            state.override_active,
            sensors,
            outputs,
            now,
            online,
        )
    }

    /// Publish the current snapshot (retained)
    pub fn publish_status<T: Transport>(
        &self,
        bridge: &mut NetworkBridge<T>,
        state: &PropState,
        sensors: &SensorEngine,
        outputs: &OutputController,
        now: Millis,
    ) -> bool {
        let snapshot = self.snapshot(state, sensors, outputs, now, bridge.is_connected());
        self.send_status(bridge, &snapshot)
    }

    /// Publish a one-shot event (not retained)
    pub fn publish_event<T: Transport>(
        &self,
        bridge: &mut NetworkBridge<T>,
        action: &str,
        source: ChangeSource,
        now: Millis,
    ) -> bool {
        let event = EventMessage::new(&self.prop_id, action, source, now.as_u64());
        let sent = bridge.publish(Channel::Event, &event);
        if sent {
            info!(action, %source, "event published");
        }
        sent
    }

    /// Legacy helper: `{sensor}_present` event attributed to the player
    pub fn publish_sensor_ok<T: Transport>(
        &self,
        bridge: &mut NetworkBridge<T>,
        sensor_name: &str,
        now: Millis,
    ) -> bool {
        let action = format!("{}_present", sensor_name);
        self.publish_event(bridge, &action, ChangeSource::Player, now)
    }

    /// Legacy helper: status with the given solved flag, source device, no override
    pub fn publish_solved<T: Transport>(
        &self,
        bridge: &mut NetworkBridge<T>,
        solved: bool,
        sensors: &SensorEngine,
        outputs: &OutputController,
        now: Millis,
    ) -> bool {
        let online = bridge.is_connected();
        let snapshot = self.build(solved, ChangeSource::Device, false, sensors, outputs, now, online);
        self.send_status(bridge, &snapshot)
    }

    fn send_status<T: Transport>(&self, bridge: &mut NetworkBridge<T>, snapshot: &StatusSnapshot) -> bool {
        let sent = bridge.publish(Channel::Status, snapshot);
        if sent {
            info!(
                solved = snapshot.solved,
                source = %snapshot.last_change_source,
                override_active = snapshot.override_active,
                "status published"
            );
        }
        sent
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        solved: bool,
        last_change_source: ChangeSource,
        override_active: bool,
        sensors: &SensorEngine,
        outputs: &OutputController,
        now: Millis,
        online: bool,
    ) -> StatusSnapshot {
        let details = StatusDetails {
            sensors: sensors
                .iter()
                .map(|(def, state)| SensorDetail { sensor_id: def.id.clone(), triggered: state.present })
                .collect(),
            outputs: outputs
                .iter()
                .map(|(def, state)| OutputDetail { output_id: def.id.clone(), state })
                .collect(),
        };
        StatusSnapshot {
            kind: "status".to_string(),
            prop_id: self.prop_id.clone(),
            name: self.name.clone(),
            online,
            solved,
            last_change_source,
            override_active,
            timestamp: now.as_u64(),
            details,
        }
    }
}
