// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output maps: translate a logical device state (turnout position, signal
//! aspect, decoupler state) into hardware output actions, and recognise the
//! reverse mapping when the hardware reports output values.

use crate::signal::aspect::SignalAspect;

/// Kind of physical output an entry drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputType {
    Single,
    Pair,
    Aspect,
    ECoSState,
}

/// Action on a single on/off output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleOutputAction {
    None,
    Off,
    On,
    Pulse,
}

/// Action on a paired output (two coils).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutputAction {
    None,
    First,
    Second,
}

/// Value written by one output map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputActionValue {
    Single(SingleOutputAction),
    Pair(PairOutputAction),
    /// 16-bit aspect number per the de-facto accessory convention.
    Aspect(i16),
    ECoSState(u16),
}

/// One `(output, action)` pair of a logical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEntry {
    pub output: OutputType,
    pub index: u16,
    pub action: OutputActionValue,
}

/// A command ready to be handed to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCommand {
    pub output: OutputType,
    pub index: u16,
    pub action: OutputActionValue,
}

/// Mapping from logical states to output entries.
#[derive(Debug, Clone)]
pub struct OutputMap<S> {
    entries: Vec<(S, Vec<OutputEntry>)>,
}

impl<S: Copy + PartialEq> OutputMap<S> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn set(&mut self, state: S, entries: Vec<OutputEntry>) {
        if let Some(slot) = self.entries.iter_mut().find(|(s, _)| *s == state) {
            slot.1 = entries;
        } else {
            self.entries.push((state, entries));
        }
    }

    pub fn entries(&self, state: S) -> &[OutputEntry] {
        self.entries
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, e)| e.as_slice())
            .unwrap_or(&[])
    }

    /// Commands to issue when the device enters `state`.
    pub fn execute(&self, state: S) -> Vec<OutputCommand> {
        self.entries(state)
            .iter()
            .map(|e| OutputCommand { output: e.output, index: e.index, action: e.action })
            .collect()
    }

    /// Logical state whose entries all match the observed output value, if
    /// any. This is the feedback path: a command station reporting an output
    /// change resolves back to the state it represents.
    pub fn state_for_output(
        &self,
        output: OutputType,
        index: u16,
        value: OutputActionValue,
    ) -> Option<S> {
        self.entries
            .iter()
            .find(|(_, entries)| {
                entries.iter().any(|e| e.output == output && e.index == index && e.action == value)
            })
            .map(|(s, _)| *s)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Copy + PartialEq> Default for OutputMap<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Default aspect numbers written by `OutputType::Aspect` entries. There is
/// no official standard yet; these follow the common signal decoder
/// convention.
pub fn default_aspect_value(aspect: SignalAspect) -> Option<i16> {
    match aspect {
        SignalAspect::Stop => Some(0),
        SignalAspect::ProceedReducedSpeed => Some(1),
        SignalAspect::Proceed => Some(16),
        SignalAspect::Unknown => None,
    }
}

/// Default pair-output wiring for a signal head.
pub fn default_pair_action(aspect: SignalAspect, index: usize) -> Option<PairOutputAction> {
    match (aspect, index) {
        (SignalAspect::Stop, 0) => Some(PairOutputAction::First),
        (SignalAspect::ProceedReducedSpeed, 1) => Some(PairOutputAction::Second),
        (SignalAspect::Proceed, 0) => Some(PairOutputAction::Second),
        _ => None,
    }
}

#[cfg(test)]
#[path = "map_tests.rs"]
mod tests;
