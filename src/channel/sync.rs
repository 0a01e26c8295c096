//! Cooperative two-channel stepping with WAIT rendezvous.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use regex::Regex;

use crate::channel::program::{Channel, ChannelState};
use crate::interpreter::Interpreter;
use crate::machine::{ModalState, ToolOffsetTable, WorkOffsetTable};
use crate::parser::{ParsedLine, parse_line};

/// Sync id used when a WAIT line carries none
pub const DEFAULT_SYNC_ID: u32 = 0;

/// Steps two channels one line per tick against shared offset tables
#[derive(Debug)]
pub struct Synchronizer {
    channels: [Channel; 2],
    work_offsets: WorkOffsetTable,
    tool_offsets: ToolOffsetTable,
    /// `#n = expr` assignments, stored as raw text
    variables: HashMap<u32, String>,
    /// Completed rendezvous per sync id
    sync_points: BTreeMap<u32, u32>,
    ticks: u64,
    wait_re: Regex,
    assign_re: Regex,
}

impl Synchronizer {
    pub fn new(
        first: &str,
        second: &str,
        work_offsets: WorkOffsetTable,
        tool_offsets: ToolOffsetTable,
    ) -> Result<Self> {
        Self::with_modal(
            [first, second],
            [ModalState::new(), ModalState::new()],
            work_offsets,
            tool_offsets,
        )
    }

    pub fn with_modal(
        programs: [&str; 2],
        modal: [ModalState; 2],
        work_offsets: WorkOffsetTable,
        tool_offsets: ToolOffsetTable,
    ) -> Result<Self> {
        let [m0, m1] = modal;
        let wait_re =
            Regex::new(r"(?i)\bWAIT[A-Z]*\s*\(?\s*(\d+)?").context("Failed to build WAIT pattern")?;
        let assign_re = Regex::new(r"^\s*#(\d+)\s*=\s*([^;(]*?)\s*(?:[;(].*)?$")
            .context("Failed to build variable pattern")?;

        Ok(Self {
            channels: [Channel::new(programs[0], m0), Channel::new(programs[1], m1)],
            work_offsets,
            tool_offsets,
            variables: HashMap::new(),
            sync_points: BTreeMap::new(),
            ticks: 0,
            wait_re,
            assign_re,
        })
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[Channel; 2] {
        &self.channels
    }

    pub fn variables(&self) -> &HashMap<u32, String> {
        &self.variables
    }

    pub fn sync_points(&self) -> &BTreeMap<u32, u32> {
        &self.sync_points
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Instruction pointers of both channels
    pub fn pointers(&self) -> [usize; 2] {
        [
            self.channels[0].current_line(),
            self.channels[1].current_line(),
        ]
    }

    pub fn is_done(&self) -> bool {
        self.channels.iter().all(|c| c.state == ChannelState::Done)
    }

    /// Advance each channel by at most one line. Returns false once both are done.
    pub fn tick(&mut self) -> bool {
        if self.is_done() {
            return false;
        }
        self.ticks += 1;

        for index in 0..self.channels.len() {
            self.step_channel(index);
        }

        self.release_waiters();

        for channel in &mut self.channels {
            if channel.state == ChannelState::Running && channel.program.is_finished() {
                channel.state = ChannelState::Done;
            }
        }

        log::trace!(
            "Tick {}: pointers {:?}, states {:?}/{:?}",
            self.ticks,
            self.pointers(),
            self.channels[0].state,
            self.channels[1].state
        );

        !self.is_done()
    }

    /// Tick until both channels finish or `max_ticks` elapse
    pub fn run(&mut self, max_ticks: u64) -> u64 {
        let start = self.ticks;
        while self.ticks - start < max_ticks && self.tick() {}
        self.ticks - start
    }

    fn step_channel(&mut self, index: usize) {
        let channel = &mut self.channels[index];
        match channel.state {
            ChannelState::Done | ChannelState::WaitingAtSync => return,
            ChannelState::Idle => channel.state = ChannelState::Running,
            ChannelState::Running => {}
        }

        let Some(line) = channel.program.current().map(str::to_string) else {
            channel.state = ChannelState::Done;
            return;
        };

        if let Some(id) = self.wait_id(&line) {
            let channel = &mut self.channels[index];
            log::debug!(
                "Channel {} waiting at line {} (sync {})",
                index + 1,
                channel.current_line(),
                id
            );
            channel.state = ChannelState::WaitingAtSync;
            channel.pending_sync = Some(id);
            return;
        }

        if let Some(caps) = self.assign_re.captures(&line) {
            if let Ok(number) = caps[1].parse::<u32>() {
                self.variables.insert(number, caps[2].to_string());
            }
        }

        let interpreter = Interpreter::new(&self.work_offsets, &self.tool_offsets);
        let channel = &mut self.channels[index];
        let line_index = channel.current_line();
        let previous = channel.last_numeric().cloned();
        let produced =
            interpreter.interpret_line(line_index, &line, &mut channel.modal, previous.as_ref());
        channel.push_records(produced);
        channel.advance();
    }

    /// Sync id when the line is a WAIT instruction
    fn wait_id(&self, line: &str) -> Option<u32> {
        let ParsedLine::Block(block) = parse_line(line) else {
            return None;
        };
        if !block.keywords.iter().any(|k| k.starts_with("WAIT")) {
            return None;
        }
        let id = self
            .wait_re
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(DEFAULT_SYNC_ID);
        Some(id)
    }

    fn release_waiters(&mut self) {
        let [a, b] = &mut self.channels;
        match (a.state, b.state) {
            (ChannelState::WaitingAtSync, ChannelState::WaitingAtSync) => {
                let id = a.pending_sync.unwrap_or(DEFAULT_SYNC_ID);
                if b.pending_sync != a.pending_sync {
                    log::warn!(
                        "Channels met at different sync ids {:?} and {:?}",
                        a.pending_sync,
                        b.pending_sync
                    );
                }
                *self.sync_points.entry(id).or_insert(0) += 1;
                log::debug!("Sync {} released at lines {:?}", id, self.pointers());
                for channel in &mut self.channels {
                    Self::release(channel);
                }
            }
            (ChannelState::WaitingAtSync, ChannelState::Done) => {
                log::warn!("Channel 1 waiting at sync but channel 2 has finished");
                Self::release(a);
            }
            (ChannelState::Done, ChannelState::WaitingAtSync) => {
                log::warn!("Channel 2 waiting at sync but channel 1 has finished");
                Self::release(b);
            }
            _ => {}
        }
    }

    fn release(channel: &mut Channel) {
        channel.pending_sync = None;
        channel.state = ChannelState::Running;
        channel.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync(a: &str, b: &str) -> Synchronizer {
        Synchronizer::new(a, b, WorkOffsetTable::new(), ToolOffsetTable::new()).unwrap()
    }

    #[test]
    fn channels_freeze_at_wait_until_both_arrive() {
        let a = "G0 X1\nG0 X2\nG0 X3\nWAIT\nG0 X4";
        let b = "G0 Y1\nG0 Y2\nG0 Y3\nG0 Y4\nG0 Y5\nWAIT\nG0 Y6";
        let mut s = sync(a, b);

        for _ in 0..3 {
            s.tick();
        }
        assert_eq!(s.pointers(), [3, 3]);

        s.tick();
        assert_eq!(s.pointers(), [3, 4]);
        assert_eq!(s.channels()[0].state, ChannelState::WaitingAtSync);

        s.tick();
        assert_eq!(s.pointers(), [3, 5]);

        // channel 2 reaches its WAIT; both released on this tick
        s.tick();
        assert_eq!(s.pointers(), [4, 6]);
        assert_eq!(s.sync_points().get(&DEFAULT_SYNC_ID), Some(&1));

        s.tick();
        assert!(s.is_done());
        assert_eq!(s.channels()[0].last_record().unwrap().x, 4.0);
        assert_eq!(s.channels()[1].last_record().unwrap().y, 6.0);
    }

    #[test]
    fn wait_lines_produce_no_records() {
        let mut s = sync("G0 X1\nWAIT\nG0 X2", "WAIT\nG0 Y2");
        s.run(100);
        assert!(s.is_done());
        assert_eq!(s.channels()[0].records.len(), 2);
        assert_eq!(s.channels()[1].records.len(), 1);
    }

    #[test]
    fn sync_ids_are_counted() {
        let mut s = sync("WAITM(1,1,2)\nWAIT 2", "WAITM(1,1,2)\nWAIT 2");
        s.run(10);
        assert_eq!(s.sync_points().get(&1), Some(&1));
        assert_eq!(s.sync_points().get(&2), Some(&1));
    }

    #[test]
    fn waiting_on_finished_channel_is_released() {
        let mut s = sync("G0 X1\nG0 X2\nG0 X3\nWAIT\nG0 X4", "G0 Y1");
        let ticks = s.run(100);
        assert!(s.is_done());
        assert!(ticks < 100);
        assert_eq!(s.channels()[0].last_record().unwrap().x, 4.0);
    }

    #[test]
    fn variables_store_raw_text() {
        let mut s = sync("#1 = 5 + [#2 * 3] ; scale\nG0 X1", "#2=10");
        s.run(10);
        assert_eq!(s.variables().get(&1).map(String::as_str), Some("5 + [#2 * 3]"));
        assert_eq!(s.variables().get(&2).map(String::as_str), Some("10"));
    }

    #[test]
    fn modal_state_is_per_channel() {
        let mut s = sync("G91\nG0 X5\nG0 X5", "G0 X5\nG0 X5");
        s.run(10);
        assert_eq!(s.channels()[0].modal.position[0], 10.0);
        assert_eq!(s.channels()[1].modal.position[0], 5.0);
    }

    #[test]
    fn done_synchronizer_stops_ticking() {
        let mut s = sync("", "");
        assert!(!s.tick());
        assert!(s.is_done());
        assert!(!s.tick());
    }
}
