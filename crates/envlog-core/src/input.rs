//! Button edge capture and press classification.
//!
//! GPIO interrupt handlers only timestamp edges and push them into
//! [`BUTTON_EDGES`]; the main loop drains the channel and turns press/release
//! pairs into [`ButtonPress`] events.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::config::{LONG_PRESS_MS, SHORT_PRESS_MS};

/// Pending edges the interrupt side may queue before the main loop drains them
pub const BUTTON_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonId {
    /// Cycle display pages (GPIO 18)
    NextPage,
    /// Refresh / context action (GPIO 19)
    Action,
}

impl ButtonId {
    fn index(self) -> usize {
        match self {
            Self::NextPage => 0,
            Self::Action => 1,
        }
    }
}

/// A timestamped level change of one button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    pub button: ButtonId,
    pub pressed: bool,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressKind {
    Short,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub button: ButtonId,
    pub kind: PressKind,
    pub duration_ms: u64,
}

pub type ButtonChannel = Channel<CriticalSectionRawMutex, ButtonEdge, BUTTON_CHANNEL_CAPACITY>;

/// Edge queue shared between the GPIO interrupt handlers and the main loop
pub static BUTTON_EDGES: ButtonChannel = Channel::new();

/// Queue an edge without blocking. Returns false if the queue was full and
/// the edge was dropped.
pub fn record_edge(channel: &ButtonChannel, edge: ButtonEdge) -> bool {
    channel.try_send(edge).is_ok()
}

/// Classify a press by how long the button was held
pub fn classify_press(duration_ms: u64) -> Option<PressKind> {
    if duration_ms < SHORT_PRESS_MS {
        Some(PressKind::Short)
    } else if duration_ms < LONG_PRESS_MS {
        Some(PressKind::Long)
    } else {
        None
    }
}

/// Pairs press and release edges per button.
#[derive(Debug, Default)]
pub struct ButtonClassifier {
    pressed_at: [Option<u64>; 2],
}

impl ButtonClassifier {
    pub const fn new() -> Self {
        Self {
            pressed_at: [None; 2],
        }
    }

    /// Feed one edge; returns a press when a release completes one.
    pub fn handle_edge(&mut self, edge: ButtonEdge) -> Option<ButtonPress> {
        let slot = &mut self.pressed_at[edge.button.index()];

        if edge.pressed {
            *slot = Some(edge.at_ms);
            return None;
        }

        // Release without a recorded press (e.g. held through boot)
        let started = slot.take()?;
        let duration_ms = edge.at_ms.saturating_sub(started);
        match classify_press(duration_ms) {
            Some(kind) => Some(ButtonPress {
                button: edge.button,
                kind,
                duration_ms,
            }),
            None => {
                debug!(
                    "Ignoring {:?} held for {} ms",
                    edge.button, duration_ms
                );
                None
            }
        }
    }

    /// Drain queued edges until one completes a press.
    pub fn poll(&mut self, channel: &ButtonChannel) -> Option<ButtonPress> {
        while let Ok(edge) = channel.try_receive() {
            if let Some(press) = self.handle_edge(edge) {
                return Some(press);
            }
        }
        None
    }
}

/// Queue a full press (down at `at_ms`, up `duration_ms` later).
///
/// Used by hosts that have no real GPIO, such as the simulator.
pub fn inject_press(channel: &ButtonChannel, button: ButtonId, at_ms: u64, duration_ms: u64) {
    let down = ButtonEdge {
        button,
        pressed: true,
        at_ms,
    };
    let up = ButtonEdge {
        button,
        pressed: false,
        at_ms: at_ms + duration_ms,
    };
    if !(record_edge(channel, down) && record_edge(channel, up)) {
        warn!("Button queue full, press on {:?} dropped", button);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(button: ButtonId, pressed: bool, at_ms: u64) -> ButtonEdge {
        ButtonEdge {
            button,
            pressed,
            at_ms,
        }
    }

    #[test]
    fn test_press_thresholds() {
        assert_eq!(classify_press(0), Some(PressKind::Short));
        assert_eq!(classify_press(999), Some(PressKind::Short));
        assert_eq!(classify_press(1_000), Some(PressKind::Long));
        assert_eq!(classify_press(1_999), Some(PressKind::Long));
        assert_eq!(classify_press(2_000), None);
    }

    #[test]
    fn test_buttons_are_tracked_independently() {
        let mut classifier = ButtonClassifier::new();
        assert_eq!(classifier.handle_edge(edge(ButtonId::NextPage, true, 100)), None);
        assert_eq!(classifier.handle_edge(edge(ButtonId::Action, true, 200)), None);

        let action = classifier
            .handle_edge(edge(ButtonId::Action, false, 1_700))
            .unwrap();
        assert_eq!(action.kind, PressKind::Long);
        assert_eq!(action.duration_ms, 1_500);

        let next = classifier
            .handle_edge(edge(ButtonId::NextPage, false, 250))
            .unwrap();
        assert_eq!(next.button, ButtonId::NextPage);
        assert_eq!(next.kind, PressKind::Short);
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut classifier = ButtonClassifier::new();
        assert_eq!(classifier.handle_edge(edge(ButtonId::Action, false, 50)), None);
    }

    #[test]
    fn test_poll_drains_channel() {
        let channel = ButtonChannel::new();
        inject_press(&channel, ButtonId::Action, 1_000, 5_000);
        inject_press(&channel, ButtonId::NextPage, 7_000, 300);

        let mut classifier = ButtonClassifier::new();
        // The over-long press is skipped, the short one comes through
        let press = classifier.poll(&channel).unwrap();
        assert_eq!(press.button, ButtonId::NextPage);
        assert_eq!(classifier.poll(&channel), None);
    }

    #[test]
    fn test_full_queue_reports_drop() {
        let channel = ButtonChannel::new();
        for i in 0..BUTTON_CHANNEL_CAPACITY as u64 {
            assert!(record_edge(&channel, edge(ButtonId::Action, i % 2 == 0, i)));
        }
        assert!(!record_edge(&channel, edge(ButtonId::Action, true, 99)));
    }
}
