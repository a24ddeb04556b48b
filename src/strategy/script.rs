use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Scope, AST};
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::strategy::{Attack, Strategy, StrategyFactory};
use crate::world::{Direction, Perception};

/// Entry points a strategy script must define, with their arity.
const REQUIRED_FUNCTIONS: [(&str, usize); 5] = [
    ("get_move", 1),
    ("fight", 1),
    ("eat", 0),
    ("color", 0),
    ("glyph", 0),
];

/// How many script operations run between wall-clock deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// A species whose behavior is a compiled Rhai script.
///
/// The script defines `get_move(info)`, `fight(opponent)`, `eat()`,
/// `color()` and `glyph()`, plus an optional `init()` that returns the
/// instance's starting memory. Every call runs with `this` bound to that
/// memory, so `this.steps += 1` persists across ticks.
pub struct ScriptFactory {
    species: String,
    engine: Arc<Engine>,
    ast: Arc<AST>,
    budget: Duration,
}

impl ScriptFactory {
    /// Compile a strategy script. The species is named after the file stem
    /// with its first letter capitalized (`ant.rhai` → `Ant`).
    pub fn from_file(path: &Path, budget: Duration) -> Result<Self, String> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read strategy {}: {}", path.display(), e))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| format!("Invalid strategy file name: {}", path.display()))?;
        Self::from_source(&species_from_stem(stem), &source, budget)
            .map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn from_source(species: &str, source: &str, budget: Duration) -> Result<Self, String> {
        let engine = build_engine();
        let ast = engine
            .compile(source)
            .map_err(|e| format!("Syntax error: {}", e))?;

        for (name, arity) in REQUIRED_FUNCTIONS {
            let defined = ast
                .iter_functions()
                .any(|f| f.name == name && f.params.len() == arity);
            if !defined {
                return Err(format!(
                    "Missing function {}() taking {} argument(s)",
                    name, arity
                ));
            }
        }

        Ok(ScriptFactory {
            species: species.to_string(),
            engine: Arc::new(engine),
            ast: Arc::new(ast),
            budget,
        })
    }

    /// Load every `.rhai` file in `dir`, sorted by filename.
    pub fn load_dir(dir: &Path, budget: Duration) -> Result<Vec<ScriptFactory>, String> {
        if !dir.exists() {
            return Err(format!(
                "Strategy directory not found: {}. Create it and add .rhai strategy scripts.",
                dir.display()
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| format!("Cannot read {}: {}", dir.display(), e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rhai"))
            .collect();
        entries.sort_by_key(|e| e.file_name());

        entries
            .iter()
            .map(|e| ScriptFactory::from_file(&e.path(), budget))
            .collect()
    }

    fn defines(&self, name: &str) -> bool {
        self.ast.iter_functions().any(|f| f.name == name)
    }
}

impl StrategyFactory for ScriptFactory {
    fn species(&self) -> &str {
        &self.species
    }

    fn instantiate(&self, seed: u64) -> Result<Box<dyn Strategy>, String> {
        let mut strategy = ScriptStrategy {
            species: self.species.clone(),
            engine: Arc::clone(&self.engine),
            ast: Arc::clone(&self.ast),
            memory: Dynamic::from(Map::new()),
            rng_state: seed,
            budget: self.budget,
        };
        if self.defines("init") {
            let memory = strategy.invoke("init", ())?;
            strategy.memory = if memory.is_unit() {
                Dynamic::from(Map::new())
            } else {
                memory
            };
        }
        Ok(Box::new(strategy))
    }
}

/// One critter's instance of a script species.
pub struct ScriptStrategy {
    species: String,
    engine: Arc<Engine>,
    ast: Arc<AST>,
    memory: Dynamic,
    rng_state: u64,
    budget: Duration,
}

impl ScriptStrategy {
    fn invoke(&mut self, name: &str, args: impl FuncArgs) -> Result<Dynamic, String> {
        RNG_STATE.with(|r| r.set(self.rng_state));
        DEADLINE.with(|d| d.set(Some(Instant::now() + self.budget)));
        LOG_MESSAGES.with(|l| l.borrow_mut().clear());

        let mut scope = Scope::new();
        let options = CallFnOptions::new()
            .eval_ast(false)
            .bind_this_ptr(&mut self.memory);
        let result =
            self.engine
                .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, name, args);

        DEADLINE.with(|d| d.set(None));
        self.rng_state = RNG_STATE.with(|r| r.get());
        LOG_MESSAGES.with(|l| {
            for msg in l.borrow().iter() {
                debug!(species = %self.species, function = name, "{}", msg);
            }
            l.borrow_mut().clear();
        });

        result.map_err(|e| match *e {
            EvalAltResult::ErrorTerminated(..) => format!(
                "{}() stopped after exceeding {}ms budget",
                name,
                self.budget.as_millis()
            ),
            other => format!("{}(): {}", name, other),
        })
    }

    fn invoke_string(&mut self, name: &str) -> Result<String, String> {
        let value = self.invoke(name, ())?;
        if value.is_char() {
            return value
                .as_char()
                .map(|c| c.to_string())
                .map_err(|t| format!("{}() returned {}", name, t));
        }
        let type_name = value.type_name();
        value
            .into_string()
            .map_err(|_| format!("{}() returned {}, expected string", name, type_name))
    }
}

impl Strategy for ScriptStrategy {
    fn decide_move(&mut self, perception: &Perception) -> Result<Direction, String> {
        let value = self.invoke("get_move", (perception_to_rhai_map(perception),))?;
        let type_name = value.type_name();
        let code = value
            .into_string()
            .map_err(|_| format!("get_move() returned {}, expected direction", type_name))?;
        Direction::parse(&code)
            .ok_or_else(|| format!("get_move() returned unknown direction '{}'", code))
    }

    fn decide_fight(&mut self, opponent: &str) -> Result<Attack, String> {
        let value = self.invoke("fight", (opponent.to_string(),))?;
        let type_name = value.type_name();
        let name = value
            .into_string()
            .map_err(|_| format!("fight() returned {}, expected attack", type_name))?;
        Attack::parse(&name).ok_or_else(|| format!("fight() returned unknown attack '{}'", name))
    }

    fn decide_eat(&mut self) -> Result<bool, String> {
        let value = self.invoke("eat", ())?;
        value
            .as_bool()
            .map_err(|t| format!("eat() returned {}, expected bool", t))
    }

    fn color(&mut self) -> Result<String, String> {
        self.invoke_string("color")
    }

    fn glyph(&mut self) -> Result<String, String> {
        self.invoke_string("glyph")
    }
}

fn species_from_stem(stem: &str) -> String {
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn build_engine() -> Engine {
    let mut engine = Engine::new();

    // Sandbox limits
    engine.set_max_operations(1_000_000);
    engine.set_max_string_size(1024);
    engine.set_max_array_size(1000);
    engine.set_max_map_size(500);
    engine.set_max_call_levels(32);
    engine.set_max_expr_depths(64, 32);
    engine.disable_symbol("eval");

    engine.register_fn("log", |msg: &str| {
        LOG_MESSAGES.with(|l| l.borrow_mut().push(msg.to_string()));
    });
    engine.on_print(|msg| {
        LOG_MESSAGES.with(|l| l.borrow_mut().push(msg.to_string()));
    });

    engine.register_fn("rand", || -> f64 {
        RNG_STATE.with(|r| {
            let next = xorshift64(r.get());
            r.set(next);
            (next as f64) / (u64::MAX as f64)
        })
    });
    // Inclusive on both ends
    engine.register_fn("rand_int", |lo: i64, hi: i64| -> i64 {
        if hi <= lo {
            return lo;
        }
        RNG_STATE.with(|r| {
            let next = xorshift64(r.get());
            r.set(next);
            let span = (hi as i128 - lo as i128 + 1) as u128;
            (lo as i128 + (next as u128 % span) as i128) as i64
        })
    });

    // Wall-clock budget: terminate the running call once the deadline passes
    engine.on_progress(|ops| {
        if ops % DEADLINE_CHECK_INTERVAL != 0 {
            return None;
        }
        DEADLINE.with(|d| match d.get() {
            Some(deadline) if Instant::now() >= deadline => Some(Dynamic::UNIT),
            _ => None,
        })
    });

    engine
}

thread_local! {
    static RNG_STATE: Cell<u64> = const { Cell::new(0) };
    static DEADLINE: Cell<Option<Instant>> = const { Cell::new(None) };
    static LOG_MESSAGES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Simple xorshift64 PRNG for per-instance script randomness.
fn xorshift64(mut state: u64) -> u64 {
    if state == 0 {
        state = 1;
    }
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    state
}

/// Expose a perception as the `info` map scripts receive.
pub fn perception_to_rhai_map(perception: &Perception) -> Dynamic {
    let mut map = Map::new();
    map.insert("x".into(), Dynamic::from(perception.x as i64));
    map.insert("y".into(), Dynamic::from(perception.y as i64));

    let mut neighbors = Map::new();
    for d in Direction::CARDINALS {
        neighbors.insert(d.code().into(), Dynamic::from(perception.neighbor(d).to_string()));
    }
    map.insert("neighbors".into(), Dynamic::from(neighbors));

    map.insert("food".into(), direction_or_unit(perception.food_direction));
    map.insert("enemy".into(), direction_or_unit(perception.enemy_direction));

    Dynamic::from(map)
}

fn direction_or_unit(direction: Option<Direction>) -> Dynamic {
    match direction {
        Some(d) => Dynamic::from(d.code().to_string()),
        None => Dynamic::UNIT,
    }
}
