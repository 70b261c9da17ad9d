//! Randomized nesting fuzz: many concurrent call trees mixing waiter,
//! transactional-waiter and coordinator roles, nested both by direct
//! awaiting and by spawning onto other tasks, with zero timeouts on the
//! coordination primitives themselves. Any deadlock shows up as a tree
//! missing its generous outer deadline.
//!
//! Spawned children clone the parent's [`UnitContext`]: they are the same
//! logical caller fanned out across tasks, which is exactly what keeps a
//! coordinator's own nested work exempt from its pause. Cross-unit
//! interleaving comes from the concurrent trees, each a fresh unit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep, timeout};

use gatevisor::{Access, Gate, GateConfig, UnitContext};

const KEY: &str = "indexing";
const TREES: usize = 120;
const MAX_DEPTH: usize = 22;

#[derive(Clone, Copy, Debug)]
enum Role {
    Waiter,
    WaiterTx,
    Coordinator,
}

#[derive(Clone, Debug)]
struct Node {
    role: Role,
    sleep_ms: u64,
    abort_early: bool,
    children: Vec<(bool, Node)>,
}

fn gen_node(rng: &mut StdRng, depth: usize) -> Node {
    let role = match rng.gen_range(0..10u32) {
        0..=4 => Role::Waiter,
        5..=6 => Role::WaiterTx,
        _ => Role::Coordinator,
    };
    let fanout = if depth >= MAX_DEPTH {
        0
    } else {
        // Mean just under 1.0 keeps a depth-22 tree tractable.
        match rng.gen_range(0..100u32) {
            0..=34 => 0,
            35..=69 => 1,
            70..=89 => 2,
            _ => 3,
        }
    };
    let abort_early = matches!(role, Role::WaiterTx) && rng.gen_bool(0.15);
    let children = (0..fanout)
        .map(|_| (rng.gen_bool(0.4), gen_node(rng, depth + 1)))
        .collect();
    Node {
        role,
        sleep_ms: rng.gen_range(1..=4),
        abort_early,
        children,
    }
}

fn max_depth(node: &Node) -> usize {
    1 + node
        .children
        .iter()
        .map(|(_, c)| max_depth(c))
        .max()
        .unwrap_or(0)
}

fn run(
    gate: Arc<Gate>,
    unit: UnitContext,
    node: Node,
    ops: Arc<AtomicUsize>,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let access = match node.role {
            Role::Waiter | Role::WaiterTx => Access::named(KEY).waiter(),
            Role::Coordinator => Access::named(KEY).coordinator(),
        };
        let g = gate.clone();
        let u = unit.clone();
        gate.protect(&unit, &access, async move {
            ops.fetch_add(1, Ordering::Relaxed);
            let _work = match node.role {
                Role::WaiterTx => Some(u.begin_unit_of_work()),
                _ => None,
            };
            sleep(Duration::from_millis(node.sleep_ms)).await;
            if node.abort_early {
                // Transaction abandoned mid-step; the guard still closes it.
                return;
            }
            let mut spawned = Vec::new();
            for (detached, child) in node.children {
                if detached {
                    spawned.push(tokio::spawn(run(
                        g.clone(),
                        u.clone(),
                        child,
                        ops.clone(),
                    )));
                } else {
                    run(g.clone(), u.clone(), child, ops.clone()).await;
                }
            }
            for handle in spawned {
                handle.await.expect("spawned child panicked");
            }
        })
        .await;
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_randomized_nested_trees_never_deadlock() {
    let seed: u64 = rand::thread_rng().gen();
    println!("fuzz seed: {seed}");
    let mut rng = StdRng::seed_from_u64(seed);

    let mut cfg = GateConfig::default();
    cfg.permits.insert(KEY.to_string(), 170);
    let gate = Arc::new(Gate::new(cfg));
    let ops = Arc::new(AtomicUsize::new(0));

    let mut deepest = 0;
    let mut trees = Vec::new();
    for _ in 0..TREES {
        let node = gen_node(&mut rng, 1);
        deepest = deepest.max(max_depth(&node));
        let jitter = rng.gen_range(0..25u64);
        let g = gate.clone();
        let o = ops.clone();
        trees.push(tokio::spawn(async move {
            sleep(Duration::from_millis(jitter)).await;
            let unit = UnitContext::new();
            timeout(
                Duration::from_secs(25),
                run(g, unit.clone(), node, o),
            )
            .await
            .expect("tree deadlocked");
            unit
        }));
    }
    println!("deepest generated tree: {deepest}");

    let mut units = Vec::new();
    for tree in trees {
        units.push(tree.await.expect("tree task panicked"));
    }

    assert!(ops.load(Ordering::Relaxed) >= TREES);
    for unit in &units {
        assert_eq!(unit.hold_depth(KEY), 0, "seed {seed}: unbalanced hold");
        assert_eq!(unit.unit_of_work_depth(), 0, "seed {seed}: open unit of work");
        assert_eq!(unit.coordinator_depth(KEY), 0, "seed {seed}: open coordinator");
    }
    let s = gate.pause_snapshot(KEY).expect("barrier never touched");
    assert!(!s.pause_requested, "seed {seed}: pause flag stuck");
    assert_eq!(s.coordinators, 0, "seed {seed}: coordinator leaked");
    assert_eq!(s.checkpointing, 0, "seed {seed}: checkpoint leaked");
    assert_eq!(s.parked, 0, "seed {seed}: parked waiter leaked");
    assert_eq!(gate.available_permits(KEY), Some(170), "seed {seed}: permit leaked");
}
