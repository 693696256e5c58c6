//! Scheduler cycle engine: the deterministic per-quantum pipeline
//! (terminate → admit → allocate → dispatch), generic over a [`Worker`]
//! implementation so it can run against a real spawned process
//! (`procman-worker::ChildWorker`) or a test double.

use std::collections::HashMap;
use std::io::{self, Write};

use procman_list::List;
use procman_memory::Allocator;
use procman_process::{Descriptor, Pcb, ProcessId, State};
use procman_worker::{Worker, WorkerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Sjf,
    Rr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Infinite,
    BestFit,
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("internal error: attempted to dispatch a process that was neither READY nor SUSPENDED")]
    InvalidDispatchPrecondition,
    #[error("io error writing transcript: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub turnaround_avg: u64,
    pub overhead_max: f64,
    pub overhead_avg: f64,
    pub makespan: u32,
}

impl Metrics {
    pub fn write_block<O: Write>(&self, out: &mut O) -> io::Result<()> {
        writeln!(out, "Turnaround time {}", self.turnaround_avg)?;
        writeln!(
            out,
            "Time overhead {:.2} {:.2}",
            self.overhead_max, self.overhead_avg
        )?;
        writeln!(out, "Makespan {}", self.makespan)
    }
}

/// The scheduler cycle engine: owns every PCB for the run's duration and the
/// five queues that move references between them.
pub struct Engine<W: Worker> {
    pcbs: HashMap<ProcessId, Pcb<W>>,
    submitted: List<ProcessId>,
    input: List<ProcessId>,
    ready: List<ProcessId>,
    running: Option<ProcessId>,
    finished: List<ProcessId>,
    allocator: Option<Allocator>,
    policy: Policy,
    memory_mode: MemoryMode,
    quantum: u32,
    time: u32,
    total_processes: usize,
}

impl<W: Worker> Engine<W> {
    /// `descriptors` must already be sorted by non-decreasing `arrival_time`
    /// — the external loader's precondition.
    pub fn new(
        descriptors: Vec<Descriptor>,
        policy: Policy,
        memory_mode: MemoryMode,
        quantum: u32,
        total_memory: u16,
    ) -> Self {
        let mut pcbs = HashMap::new();
        let mut submitted = List::new();
        for (i, desc) in descriptors.into_iter().enumerate() {
            let id = ProcessId(i as u64);
            pcbs.insert(id, Pcb::new(id, desc));
            submitted.append(id);
        }
        let total_processes = pcbs.len();
        let allocator = match memory_mode {
            MemoryMode::Infinite => None,
            MemoryMode::BestFit => Some(Allocator::new(total_memory)),
        };

        Engine {
            pcbs,
            submitted,
            input: List::new(),
            ready: List::new(),
            running: None,
            finished: List::new(),
            allocator,
            policy,
            memory_mode,
            quantum,
            time: 0,
            total_processes,
        }
    }

    /// Run the simulation to completion, writing the bit-exact transcript
    /// (including the trailing metrics block) to `out`.
    pub fn run<O: Write>(&mut self, out: &mut O) -> Result<Metrics, SimError> {
        if self.total_processes == 0 {
            let metrics = self.compute_metrics();
            metrics.write_block(out)?;
            return Ok(metrics);
        }

        loop {
            self.phase1_termination(out)?;
            self.phase2_admission()?;
            self.phase3_memory_admission(out)?;
            self.phase4_dispatch(out)?;

            if self.finished.len() == self.total_processes {
                break;
            }
            self.time += self.quantum;
        }

        let metrics = self.compute_metrics();
        metrics.write_block(out)?;
        Ok(metrics)
    }

    fn phase1_termination<O: Write>(&mut self, out: &mut O) -> Result<(), SimError> {
        let Some(rid) = self.running else {
            return Ok(());
        };
        let t = self.time;
        let quantum = self.quantum;

        let finished_now = {
            let pcb = self.pcbs.get_mut(&rid).unwrap();
            pcb.tick(quantum)
        };
        if !finished_now {
            return Ok(());
        }

        if let Some(allocator) = &mut self.allocator {
            let handle = self.pcbs.get_mut(&rid).unwrap().memory_handle.take();
            if let Some(block_id) = handle {
                allocator.free(block_id);
            }
        }

        let proc_remaining = self.input.len() + self.ready.len();
        let name = self.pcbs[&rid].name.clone();
        writeln!(
            out,
            "{t},FINISHED,process_name={name},proc_remaining={proc_remaining}"
        )?;

        self.running = None;
        {
            let pcb = self.pcbs.get_mut(&rid).unwrap();
            pcb.state = State::Terminated;
            pcb.termination_time = t;
        }
        self.finished.append(rid);

        let worker = self.pcbs.get_mut(&rid).unwrap().worker.take().unwrap();
        let digest = worker.terminate(t)?;
        log::debug!("t={t}: {name} terminated, {proc_remaining} processes left to admit/run");
        writeln!(out, "{t},FINISHED-PROCESS,process_name={name},sha={digest}")?;

        Ok(())
    }

    fn phase2_admission(&mut self) -> Result<(), SimError> {
        let t = self.time;
        loop {
            let Some(hid) = self.submitted.head() else {
                break;
            };
            if self.pcbs[&hid].arrival_time > t {
                break;
            }
            self.submitted.pop_head();
            self.input.append(hid);

            let name = self.pcbs[&hid].name.clone();
            log::trace!("t={t}: admitting {name} into input, spawning its worker");
            let worker = W::spawn(&name)?;
            let pcb = self.pcbs.get_mut(&hid).unwrap();
            pcb.state = State::New;
            pcb.worker = Some(worker);
        }
        Ok(())
    }

    fn phase3_memory_admission<O: Write>(&mut self, out: &mut O) -> Result<(), SimError> {
        let t = self.time;
        match self.memory_mode {
            MemoryMode::Infinite => {
                while let Some(id) = self.input.pop_head() {
                    self.pcbs.get_mut(&id).unwrap().state = State::Ready;
                    self.ready.append(id);
                }
            }
            MemoryMode::BestFit => {
                let candidates: Vec<ProcessId> = self.input.iter().collect();
                let allocator = self.allocator.as_mut().expect("best-fit allocator present");
                for id in candidates {
                    let size = self.pcbs[&id].memory_size;
                    if let Some(block_id) = allocator.allocate(size) {
                        let location = allocator.block(block_id).location;
                        let name = &self.pcbs[&id].name;
                        writeln!(
                            out,
                            "{t},READY,process_name={name},assigned_at={location}"
                        )?;
                        let pcb = self.pcbs.get_mut(&id).unwrap();
                        pcb.memory_handle = Some(block_id);
                        pcb.state = State::Ready;
                        self.input.remove(id);
                        self.ready.append(id);
                    } else {
                        log::trace!(
                            "t={t}: {} needs {size}MB, no free block fits yet, waiting in input",
                            self.pcbs[&id].name
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn phase4_dispatch<O: Write>(&mut self, out: &mut O) -> Result<(), SimError> {
        match self.policy {
            Policy::Sjf => self.dispatch_sjf(out),
            Policy::Rr => self.dispatch_rr(out),
        }
    }

    /// Non-preemptive: a still-running process just gets ticked forward
    /// (`continue`); only an empty `running` slot triggers a new selection.
    fn dispatch_sjf<O: Write>(&mut self, out: &mut O) -> Result<(), SimError> {
        let t = self.time;
        if let Some(rid) = self.running {
            if self.pcbs[&rid].state == State::Running {
                let worker = self.pcbs.get_mut(&rid).unwrap().worker.as_mut().unwrap();
                worker.continue_(t)?;
            }
            return Ok(());
        }

        let Some(chosen) = self.select_shortest_job() else {
            return Ok(());
        };
        self.ready.remove(chosen);
        self.running = Some(chosen);
        let remaining = self.pcbs[&chosen].remaining_time;
        let name = self.pcbs[&chosen].name.clone();
        log::debug!("t={t}: SJF selects {name} (remaining_time={remaining}) from ready");
        writeln!(
            out,
            "{t},RUNNING,process_name={name},remaining_time={remaining}"
        )?;
        let pcb = self.pcbs.get_mut(&chosen).unwrap();
        pcb.state = State::Running;
        pcb.worker.as_mut().unwrap().start(t)?;
        Ok(())
    }

    /// `(remaining_time, arrival_time, name)` minimum, byte-wise on name —
    /// deliberately not locale-aware, so the tie-break is reproducible
    /// across platforms.
    fn select_shortest_job(&self) -> Option<ProcessId> {
        self.ready
            .iter()
            .min_by(|&a, &b| {
                let pa = &self.pcbs[&a];
                let pb = &self.pcbs[&b];
                (pa.remaining_time, pa.arrival_time, pa.name.as_bytes()).cmp(&(
                    pb.remaining_time,
                    pb.arrival_time,
                    pb.name.as_bytes(),
                ))
            })
    }

    fn dispatch_rr<O: Write>(&mut self, out: &mut O) -> Result<(), SimError> {
        let t = self.time;

        if self.ready.is_empty() {
            if let Some(rid) = self.running {
                let worker = self.pcbs.get_mut(&rid).unwrap().worker.as_mut().unwrap();
                worker.continue_(t)?;
            }
            return Ok(());
        }

        if let Some(rid) = self.running {
            {
                let pcb = self.pcbs.get_mut(&rid).unwrap();
                pcb.state = State::Suspended;
            }
            let worker = self.pcbs.get_mut(&rid).unwrap().worker.as_mut().unwrap();
            worker.suspend(t)?;
            self.running = None;
            self.ready.append(rid);
        }

        let chosen = self.ready.pop_head().expect("ready is non-empty here");
        self.running = Some(chosen);
        let remaining = self.pcbs[&chosen].remaining_time;
        let name = self.pcbs[&chosen].name.clone();
        log::debug!("t={t}: RR rotates {name} (remaining_time={remaining}) to the front of ready into running");
        writeln!(
            out,
            "{t},RUNNING,process_name={name},remaining_time={remaining}"
        )?;

        let prior_state = self.pcbs[&chosen].state;
        let worker = self.pcbs.get_mut(&chosen).unwrap().worker.as_mut().unwrap();
        match prior_state {
            State::Ready => worker.start(t)?,
            State::Suspended => worker.continue_(t)?,
            _ => return Err(SimError::InvalidDispatchPrecondition),
        }
        self.pcbs.get_mut(&chosen).unwrap().state = State::Running;
        Ok(())
    }

    fn compute_metrics(&self) -> Metrics {
        let finished: Vec<&Pcb<W>> = self.finished.iter().map(|id| &self.pcbs[&id]).collect();
        let n = finished.len() as u64;
        if n == 0 {
            return Metrics {
                turnaround_avg: 0,
                overhead_max: 0.0,
                overhead_avg: 0.0,
                makespan: self.time,
            };
        }

        let sum_turnaround: u64 = finished.iter().map(|p| p.turnaround() as u64).sum();
        let turnaround_avg = (sum_turnaround + n - 1) / n; // ceiling division

        let overheads: Vec<f64> = finished.iter().map(|p| p.overhead()).collect();
        let overhead_max = overheads.iter().cloned().fold(f64::MIN, f64::max);
        let overhead_avg = overheads.iter().sum::<f64>() / n as f64;

        Metrics {
            turnaround_avg,
            overhead_max,
            overhead_avg,
            makespan: self.time,
        }
    }
}
