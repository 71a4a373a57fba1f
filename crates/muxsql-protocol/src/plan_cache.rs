use muxsql_core::{ColumnMeta, Datasource, MuxError, Result, StatementClass};
use regex_lite::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::debug;

const SHARD_HINT_MARKER: &str = "SHARDKEY=";
const SHARD_HINT_PATTERN: &str =
    r"/\*\s*SHARDKEY=([^(\s]+)\(([\d,\s]+)\),\s*ScuttleId\(([\d,\s]+)\)\s*\*/";
const CALL_ESCAPE_PATTERN: &str = r"(?s)\{\s*call\s*(.*)\}";
const DISABLE_CACHE_MARKER: &str = "DisableStmtCache";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub escape_enabled: bool,
    pub sharding_enabled: bool,
    pub param_name_binding_enabled: bool,
    pub datasource: Datasource,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            escape_enabled: true,
            sharding_enabled: false,
            param_name_binding_enabled: true,
            datasource: Datasource::Hera,
        }
    }
}

/// Which bound positions form the shard key and which positions receive the
/// routing id computed from them. Positions are 1-based and paired by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardingInfo {
    pub key_name: String,
    pub key_positions: Vec<usize>,
    pub scuttle_positions: Vec<usize>,
}

/// Memoized per-SQL metadata. Classification and column metadata are
/// discovered by the first execution and fixed afterwards.
#[derive(Debug)]
pub struct PlanEntry {
    sql: String,
    parsed_sql: String,
    param_count: usize,
    param_names: HashMap<usize, String>,
    sharding: Option<ShardingInfo>,
    cacheable: bool,
    class: OnceLock<StatementClass>,
    column_meta: OnceLock<Arc<Vec<ColumnMeta>>>,
}

impl PlanEntry {
    pub fn parse(
        sql: &str,
        options: &PlanOptions,
        names: Option<&HashMap<usize, String>>,
    ) -> Result<Self> {
        let source = if options.escape_enabled {
            rewrite_call_escape(sql, options.datasource)?
        } else {
            sql.to_string()
        };
        let param_names = match names {
            Some(names) if options.param_name_binding_enabled => names.clone(),
            _ => HashMap::new(),
        };

        let mut parsed = String::with_capacity(source.len() + 16);
        let mut comments = String::new();
        let mut param_count = 0usize;
        let mut in_literal = false;
        let mut rest = source.as_str();
        while let Some(ch) = rest.chars().next() {
            if !in_literal && rest.starts_with("/*") {
                let end = rest[2..].find("*/").map(|idx| idx + 4).unwrap_or(2);
                let comment = &rest[..end];
                parsed.push_str(comment);
                comments.push_str(comment);
                rest = &rest[end..];
                continue;
            }
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    parsed.push(ch);
                }
                '?' if !in_literal => {
                    param_count += 1;
                    parsed.push(':');
                    match param_names.get(&param_count) {
                        Some(name) => parsed.push_str(name.trim()),
                        None => parsed.push_str(&default_param_name(param_count)),
                    }
                }
                _ => parsed.push(ch),
            }
            rest = &rest[ch.len_utf8()..];
        }

        let sharding = if options.sharding_enabled {
            parse_shard_hint(&comments)?
        } else {
            None
        };
        let cacheable = !comments.contains(DISABLE_CACHE_MARKER);
        debug!(params = param_count, cacheable, sharded = sharding.is_some(), "parsed sql");

        Ok(Self {
            sql: sql.to_string(),
            parsed_sql: parsed,
            param_count,
            param_names,
            sharding,
            cacheable,
            class: OnceLock::new(),
            column_meta: OnceLock::new(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parsed_sql(&self) -> &str {
        &self.parsed_sql
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Name the proxy knows position `position` by.
    pub fn param_name(&self, position: usize) -> String {
        match self.param_names.get(&position) {
            Some(name) => name.trim().to_string(),
            None => default_param_name(position),
        }
    }

    pub fn sharding(&self) -> Option<&ShardingInfo> {
        self.sharding.as_ref()
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn class(&self) -> StatementClass {
        self.class.get().copied().unwrap_or_default()
    }

    /// Records the classification once; `Unknown` and later calls are ignored.
    pub fn memoize_class(&self, class: StatementClass) {
        if class != StatementClass::Unknown {
            let _ = self.class.set(class);
        }
    }

    pub fn column_meta(&self) -> Option<Arc<Vec<ColumnMeta>>> {
        self.column_meta.get().cloned()
    }

    pub fn memoize_column_meta(&self, meta: Vec<ColumnMeta>) -> Arc<Vec<ColumnMeta>> {
        self.column_meta.get_or_init(|| Arc::new(meta)).clone()
    }

    /// 1-based column position for a case-insensitive column name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_meta.get().and_then(|meta| {
            meta.iter()
                .position(|column| column.name.eq_ignore_ascii_case(name))
                .map(|idx| idx + 1)
        })
    }
}

pub fn default_param_name(position: usize) -> String {
    format!("p{position}")
}

fn rewrite_call_escape(sql: &str, datasource: Datasource) -> Result<String> {
    if !sql.contains('{') {
        return Ok(sql.to_string());
    }
    let re = Regex::new(CALL_ESCAPE_PATTERN)
        .map_err(|err| MuxError::Configuration(format!("call escape pattern: {err}")))?;
    let Some(call) = re.captures(sql).and_then(|caps| caps.get(1)) else {
        return Ok(sql.to_string());
    };
    let body = call.as_str().trim();
    let rewritten = match datasource {
        Datasource::Oracle => format!("BEGIN {body}; END;"),
        Datasource::Hera | Datasource::Mysql => format!("CALL {body};"),
    };
    debug!(sql = %rewritten, "rewrote call escape");
    Ok(rewritten)
}

fn parse_shard_hint(comments: &str) -> Result<Option<ShardingInfo>> {
    if !comments.contains(SHARD_HINT_MARKER) {
        return Ok(None);
    }
    let re = Regex::new(SHARD_HINT_PATTERN)
        .map_err(|err| MuxError::Configuration(format!("shard hint pattern: {err}")))?;
    let Some(caps) = re.captures(comments) else {
        return Err(MuxError::Configuration(format!(
            "malformed shard hint in {comments:?}"
        )));
    };
    let key_name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let key_positions = parse_positions(caps.get(2).map(|m| m.as_str()).unwrap_or_default())?;
    let scuttle_positions = parse_positions(caps.get(3).map(|m| m.as_str()).unwrap_or_default())?;
    Ok(Some(ShardingInfo {
        key_name: key_name.to_string(),
        key_positions,
        scuttle_positions,
    }))
}

fn parse_positions(list: &str) -> Result<Vec<usize>> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<usize>()
                .map_err(|_| MuxError::Configuration(format!("bad shard hint position {item:?}")))
        })
        .collect()
}

/// Source of plan entries. Implementations are shared between sessions and
/// must be safe to call concurrently.
pub trait PlanCache: Send + Sync {
    fn entry(&self, sql: &str, options: &PlanOptions) -> Result<Arc<PlanEntry>>;
}

#[derive(Default)]
struct LruState {
    entries: HashMap<String, (Arc<PlanEntry>, u64)>,
    order: BTreeMap<u64, String>,
    tick: u64,
}

/// Bounded LRU of plan entries keyed by SQL text.
pub struct StatementCache {
    capacity: usize,
    state: Mutex<LruState>,
    name_bindings: Mutex<HashMap<String, HashMap<usize, String>>>,
}

impl StatementCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LruState::default()),
            name_bindings: Mutex::new(HashMap::new()),
        }
    }

    /// Registers proxy-side parameter names for a SQL text; used when
    /// param-name binding is enabled.
    pub fn register_param_names(&self, sql: &str, names: HashMap<usize, String>) {
        self.name_bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sql.to_string(), names);
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, sql: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .contains_key(sql)
    }
}

impl PlanCache for StatementCache {
    fn entry(&self, sql: &str, options: &PlanOptions) -> Result<Arc<PlanEntry>> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        state.tick += 1;
        let tick = state.tick;
        if let Some((entry, last_used)) = state.entries.get_mut(sql) {
            let entry = entry.clone();
            let previous = std::mem::replace(last_used, tick);
            state.order.remove(&previous);
            state.order.insert(tick, sql.to_string());
            return Ok(entry);
        }

        let names = self
            .name_bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sql)
            .cloned();
        let entry = Arc::new(PlanEntry::parse(sql, options, names.as_ref())?);
        if !entry.is_cacheable() {
            return Ok(entry);
        }
        while state.entries.len() >= self.capacity {
            let Some((_, oldest)) = state.order.pop_first() else {
                break;
            };
            state.entries.remove(&oldest);
            debug!(sql = %oldest, "evicted plan entry");
        }
        state.entries.insert(sql.to_string(), (entry.clone(), tick));
        state.order.insert(tick, sql.to_string());
        Ok(entry)
    }
}

/// Process-wide map from connection target to its statement cache.
#[derive(Default)]
pub struct PlanCacheRegistry {
    caches: Mutex<HashMap<String, Arc<StatementCache>>>,
}

impl PlanCacheRegistry {
    pub fn global() -> &'static PlanCacheRegistry {
        static REGISTRY: OnceLock<PlanCacheRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PlanCacheRegistry::default)
    }

    pub fn cache_for(&self, target: &str, capacity: usize) -> Arc<StatementCache> {
        self.caches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(StatementCache::new(capacity)))
            .clone()
    }
}
