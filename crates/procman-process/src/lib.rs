//! Process control block (PCB): identity, timing, memory handle, state, and
//! worker handle for one simulated process.

use procman_memory::BlockId;
use procman_worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    New,
    Ready,
    Running,
    Suspended,
    Terminated,
}

/// Descriptor fields as read from the process-descriptor file, before a PCB
/// is constructed for them.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: String,
    pub arrival_time: u32,
    pub service_time: u32,
    pub memory_size: u16,
}

/// One simulated process. Generic over the worker implementation so the
/// scheduler cycle engine can run against a real `ChildWorker` in production
/// and a fake in tests.
pub struct Pcb<W: Worker> {
    pub id: ProcessId,
    pub name: String,
    pub arrival_time: u32,
    pub service_time: u32,
    pub remaining_time: u32,
    pub memory_size: u16,
    pub memory_handle: Option<BlockId>,
    pub state: State,
    pub termination_time: u32,
    pub worker: Option<W>,
}

impl<W: Worker> Pcb<W> {
    pub fn new(id: ProcessId, desc: Descriptor) -> Self {
        Pcb {
            id,
            name: desc.name,
            arrival_time: desc.arrival_time,
            service_time: desc.service_time,
            remaining_time: desc.service_time,
            memory_size: desc.memory_size,
            memory_handle: None,
            state: State::New,
            termination_time: 0,
            worker: None,
        }
    }

    /// Decrement `remaining_time` by `quantum`, saturating at zero. Returns
    /// `true` if this tick finished the process.
    pub fn tick(&mut self, quantum: u32) -> bool {
        self.remaining_time = self.remaining_time.saturating_sub(quantum);
        debug_assert!(self.remaining_time <= self.service_time);
        self.remaining_time == 0
    }

    pub fn turnaround(&self) -> u32 {
        self.termination_time - self.arrival_time
    }

    pub fn overhead(&self) -> f64 {
        self.turnaround() as f64 / self.service_time as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procman_worker::WorkerError;

    struct NoopWorker;
    impl Worker for NoopWorker {
        fn spawn(_name: &str) -> Result<Self, WorkerError> {
            Ok(NoopWorker)
        }
        fn start(&mut self, _t: u32) -> Result<(), WorkerError> {
            Ok(())
        }
        fn suspend(&mut self, _t: u32) -> Result<(), WorkerError> {
            Ok(())
        }
        fn continue_(&mut self, _t: u32) -> Result<(), WorkerError> {
            Ok(())
        }
        fn terminate(self, _t: u32) -> Result<String, WorkerError> {
            Ok("0".repeat(64))
        }
    }

    fn desc(name: &str, arrival: u32, service: u32, mem: u16) -> Descriptor {
        Descriptor {
            name: name.to_string(),
            arrival_time: arrival,
            service_time: service,
            memory_size: mem,
        }
    }

    #[test]
    fn remaining_time_saturates_at_zero() {
        let mut p: Pcb<NoopWorker> = Pcb::new(ProcessId(0), desc("P1", 0, 5, 10));
        assert!(!p.tick(3));
        assert_eq!(p.remaining_time, 2);
        assert!(p.tick(3));
        assert_eq!(p.remaining_time, 0);
    }

    #[test]
    fn turnaround_and_overhead() {
        let mut p: Pcb<NoopWorker> = Pcb::new(ProcessId(0), desc("P1", 2, 4, 10));
        p.termination_time = 10;
        assert_eq!(p.turnaround(), 8);
        assert_eq!(p.overhead(), 2.0);
    }
}
