//! Simple profiling macros using thread-local storage
//!
//! Lightweight timing of the engine's hot paths without changing function signatures.
//! Enable with environment variable: SPE_ED_PROFILE=1

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Profiled code sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Regions,
    Voronoi,
    Occupancy,
    Heuristic,
    Search,
}

impl Category {
    const ALL: [Category; 5] = [
        Category::Regions,
        Category::Voronoi,
        Category::Occupancy,
        Category::Heuristic,
        Category::Search,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Category::Regions => "Region Labeling",
            Category::Voronoi => "Tessellation",
            Category::Occupancy => "Occupancy Forecast",
            Category::Heuristic => "Heuristic Evaluation",
            Category::Search => "Decision Search",
        }
    }
}

const SLOTS: usize = Category::ALL.len();

thread_local! {
    static TIMES: RefCell<[u64; SLOTS]> = const { RefCell::new([0; SLOTS]) };
    static COUNTS: RefCell<[usize; SLOTS]> = const { RefCell::new([0; SLOTS]) };
    static NODES_EXPANDED: RefCell<usize> = const { RefCell::new(0) };
}

// Global aggregators
static GLOBAL_TIMES: [AtomicU64; SLOTS] = [const { AtomicU64::new(0) }; SLOTS];
static GLOBAL_COUNTS: [AtomicUsize; SLOTS] = [const { AtomicUsize::new(0) }; SLOTS];
static GLOBAL_NODES_EXPANDED: AtomicUsize = AtomicUsize::new(0);

#[inline]
pub fn is_profiling_enabled() -> bool {
    std::env::var("SPE_ED_PROFILE").is_ok()
}

pub struct ProfileGuard {
    start: Instant,
    category: Category,
}

impl ProfileGuard {
    pub fn new(category: Category) -> Option<Self> {
        if is_profiling_enabled() {
            Some(ProfileGuard {
                start: Instant::now(),
                category,
            })
        } else {
            None
        }
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        let elapsed_ns = self.start.elapsed().as_nanos() as u64;
        let slot = self.category.slot();
        TIMES.with(|t| t.borrow_mut()[slot] += elapsed_ns);
        COUNTS.with(|c| c.borrow_mut()[slot] += 1);
    }
}

#[inline]
pub fn record_node_expanded() {
    if is_profiling_enabled() {
        NODES_EXPANDED.with(|c| *c.borrow_mut() += 1);
    }
}

/// Moves this thread's counters into the global totals
pub fn merge_thread_local() {
    if !is_profiling_enabled() {
        return;
    }

    TIMES.with(|t| {
        let mut t = t.borrow_mut();
        for (slot, v) in t.iter_mut().enumerate() {
            GLOBAL_TIMES[slot].fetch_add(*v, Ordering::Relaxed);
            *v = 0;
        }
    });
    COUNTS.with(|c| {
        let mut c = c.borrow_mut();
        for (slot, v) in c.iter_mut().enumerate() {
            GLOBAL_COUNTS[slot].fetch_add(*v, Ordering::Relaxed);
            *v = 0;
        }
    });
    NODES_EXPANDED.with(|c| {
        GLOBAL_NODES_EXPANDED.fetch_add(*c.borrow(), Ordering::Relaxed);
        *c.borrow_mut() = 0;
    });
}

pub fn print_report(total_time_ms: u64) {
    if !is_profiling_enabled() {
        return;
    }

    let total_ns = total_time_ms * 1_000_000;

    eprintln!("\n═══════════════════════════════════════════════════════════");
    eprintln!("                 PERFORMANCE PROFILE");
    eprintln!("═══════════════════════════════════════════════════════════");
    eprintln!("Total Time: {}ms\n", total_time_ms);

    for category in Category::ALL {
        let slot = category.slot();
        let time = GLOBAL_TIMES[slot].load(Ordering::Relaxed);
        let count = GLOBAL_COUNTS[slot].load(Ordering::Relaxed);
        let ms = time as f64 / 1_000_000.0;
        let pct = if total_ns > 0 { 100.0 * time as f64 / total_ns as f64 } else { 0.0 };
        let avg_us = if count > 0 { time as f64 / (count * 1000) as f64 } else { 0.0 };

        eprintln!("{}:", category.label());
        eprintln!("  Time:     {:.2}ms ({:.1}%)", ms, pct);
        eprintln!("  Calls:    {}", count);
        eprintln!("  Avg:      {:.2}µs/call\n", avg_us);
    }

    eprintln!(
        "Search Nodes Expanded: {}",
        GLOBAL_NODES_EXPANDED.load(Ordering::Relaxed)
    );
    eprintln!("═══════════════════════════════════════════════════════════\n");
}

pub fn reset() {
    for slot in 0..SLOTS {
        GLOBAL_TIMES[slot].store(0, Ordering::Relaxed);
        GLOBAL_COUNTS[slot].store(0, Ordering::Relaxed);
    }
    GLOBAL_NODES_EXPANDED.store(0, Ordering::Relaxed);
}

#[macro_export]
macro_rules! profile {
    ($category:expr, $code:block) => {{
        let _guard = $crate::simple_profiler::ProfileGuard::new($category);
        $code
    }};
}
