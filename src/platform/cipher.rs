//! Signature and throttling parameter rules of the player script
//!
//! The player script hides two transformations: one applied to the 's'
//! value of a signatureCipher and one applied to the 'n' query parameter.
//! [`RuleEvaluator`] is the capability the deobfuscator needs from them,
//! [`DenoEvaluator`] implements it by running the located functions in V8.

use crate::error::RytError;
use async_trait::async_trait;
use deno_core::{v8, FastString, JsRuntime, RuntimeOptions};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Evaluates the player script's transformation rules
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    /// Decode the 's' value of a signatureCipher
    async fn extract_sig(&self, input: &str) -> Result<String, RytError>;

    /// Decode the 'n' throttling parameter
    async fn extract_n_sig(&self, input: &str) -> Result<String, RytError>;
}

/// How much of the player script is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorMode {
    /// Only the located functions and their helper object
    Snippet,
    /// The whole script, with the located functions exported
    FullScript,
}

impl EvaluatorMode {
    pub fn from_ejs(use_ejs: bool) -> Self {
        if use_ejs {
            EvaluatorMode::FullScript
        } else {
            EvaluatorMode::Snippet
        }
    }
}

/// Builds a [`RuleEvaluator`] from player script text
#[async_trait]
pub trait EvaluatorFactory: Send + Sync {
    async fn create(
        &self,
        player_js: Arc<str>,
        mode: EvaluatorMode,
    ) -> Result<Arc<dyn RuleEvaluator>, RytError>;
}

/// Factory producing [`DenoEvaluator`] instances
#[derive(Debug, Clone, Copy, Default)]
pub struct DenoEvaluatorFactory;

#[async_trait]
impl EvaluatorFactory for DenoEvaluatorFactory {
    async fn create(
        &self,
        player_js: Arc<str>,
        mode: EvaluatorMode,
    ) -> Result<Arc<dyn RuleEvaluator>, RytError> {
        let evaluator = DenoEvaluator::spawn(player_js, mode).await?;
        Ok(Arc::new(evaluator))
    }
}

const SIG_ENTRY: &str = "__ryt_sig";
const NSIG_ENTRY: &str = "__ryt_nsig";

/// Globals the player script expects from a browser, and entry points that
/// fail loudly until the located functions replace them.
const PRELUDE: &str = r#"
var window = globalThis;
var self = globalThis;
var document = { createElement: function () { return {}; }, documentElement: {} };
var navigator = { userAgent: "" };
var location = { hostname: "www.youtube.com", href: "https://www.youtube.com/", protocol: "https:" };
var _yt_player = {};
var __ryt_sig = function () { throw new Error("signature function not found"); };
var __ryt_nsig = function () { throw new Error("n function not found"); };
"#;

/// `Kq=function(a){a=a.split("")`
static SIG_FUNCTION_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"([a-zA-Z0-9_$]+)\s*=\s*function\(\s*([a-zA-Z0-9_$]+)\s*\)\s*\{\s*([a-zA-Z0-9_$]+)\s*=\s*([a-zA-Z0-9_$]+)\.split\(\s*""\s*\)"#,
    )
    .expect("valid signature function pattern")
});

/// `function Kq(a){a=a.split("")`
static SIG_FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"function\s+([a-zA-Z0-9_$]+)\s*\(\s*([a-zA-Z0-9_$]+)\s*\)\s*\{\s*([a-zA-Z0-9_$]+)\s*=\s*([a-zA-Z0-9_$]+)\.split\(\s*""\s*\)"#,
    )
    .expect("valid signature function pattern")
});

/// `;Xy.ab(a,1)` or `;Xy["ab"](a,1)` inside the signature function
static SIG_HELPER_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#";\s*([a-zA-Z0-9_$]{2,})(?:\.[a-zA-Z0-9_$]+|\[[^\]]+\])\("#)
        .expect("valid helper call pattern")
});

/// `.get("n"))&&(b=Iw[0](b)`
static N_FUNCTION_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\.get\("n"\)\)&&\([a-zA-Z0-9$_]=([a-zA-Z0-9$_]+)(?:\[(\d+)\])?\([a-zA-Z0-9$_]\)"#,
    )
    .expect("valid n function pattern")
});

/// Early exit the n function takes when run outside the player
static N_TYPEOF_GUARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#";\s*if\s*\(\s*typeof\s+[a-zA-Z0-9_$]+\s*===?\s*(?:"undefined"|'undefined'|[a-zA-Z0-9_$]+\[\d+\])\s*\)\s*return\s+[a-zA-Z0-9_$]+;"#,
    )
    .expect("valid typeof guard pattern")
});

/// A function located in the player script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFunction {
    pub name: String,
    /// Anonymous function expression, `function(a){...}`
    pub code: String,
}

/// Return the `{...}` block opening at `open`, string literals respected
pub fn extract_balanced_block(source: &str, open: usize) -> Option<&str> {
    let bytes = source.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (offset, &byte) in bytes[open..].iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == q {
                quote = None;
            }
            continue;
        }

        match byte {
            b'"' | b'\'' | b'`' => quote = Some(byte),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&source[open..=open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn block_after(source: &str, from: usize) -> Option<&str> {
    let open = from + source[from..].find('{')?;
    extract_balanced_block(source, open)
}

/// Locate the signature function
pub fn find_sig_function(player_js: &str) -> Option<LocatedFunction> {
    for pattern in [&*SIG_FUNCTION_ASSIGN, &*SIG_FUNCTION_DECL] {
        for captures in pattern.captures_iter(player_js) {
            let (Some(name), Some(param), Some(lhs), Some(rhs)) = (
                captures.get(1),
                captures.get(2),
                captures.get(3),
                captures.get(4),
            ) else {
                continue;
            };
            let param_end = param.end();
            let param = param.as_str();
            if lhs.as_str() != param || rhs.as_str() != param {
                continue;
            }

            let Some(body) = block_after(player_js, param_end) else {
                continue;
            };
            if !body.contains(&format!("{}.join(\"\")", param)) {
                continue;
            }

            debug!("Found signature function: {}", name.as_str());
            return Some(LocatedFunction {
                name: name.as_str().to_string(),
                code: format!("function({}){}", param, body),
            });
        }
    }
    None
}

/// Locate the object holding the signature function's transform steps and
/// return its declaration
pub fn find_sig_helper(player_js: &str, sig_code: &str) -> Option<String> {
    let name = SIG_HELPER_CALL.captures(sig_code)?.get(1)?.as_str();
    let declaration = Regex::new(&format!(
        r#"(?:var|let|const)\s+{}\s*=\s*"#,
        regex::escape(name)
    ))
    .ok()?;
    let found = declaration.find(player_js)?;
    let body = block_after(player_js, found.end())?;
    debug!("Found signature helper object: {}", name);
    Some(format!("var {}={};", name, body))
}

/// Name of the n function referenced next to `.get("n")`
pub fn find_n_function_name(player_js: &str) -> Option<String> {
    let captures = N_FUNCTION_REF.captures(player_js)?;
    let name = captures.get(1)?.as_str();

    let Some(index) = captures.get(2) else {
        return Some(name.to_string());
    };
    let index: usize = index.as_str().parse().ok()?;

    // var Iw=[zo];
    let array = Regex::new(&format!(r#"var\s+{}\s*=\s*\[([^\]]+)\]"#, regex::escape(name))).ok()?;
    let entries = array.captures(player_js)?.get(1)?.as_str();
    entries
        .split(',')
        .nth(index)
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
}

/// Locate the n function
pub fn find_n_function(player_js: &str) -> Option<LocatedFunction> {
    let name = find_n_function_name(player_js)?;
    let escaped = regex::escape(&name);

    let assigned = Regex::new(&format!(
        r#"(?:^|[;,\s{{}}]){}\s*=\s*function\s*\(([^)]*)\)"#,
        escaped
    ))
    .ok()?;
    let declared = Regex::new(&format!(r#"function\s+{}\s*\(([^)]*)\)"#, escaped)).ok()?;

    let captures = assigned
        .captures(player_js)
        .or_else(|| declared.captures(player_js))?;
    let params = captures.get(1)?.as_str();
    let body = block_after(player_js, captures.get(0)?.end())?;
    let body = N_TYPEOF_GUARD.replace_all(body, ";");

    debug!("Found n function: {}", name);
    Some(LocatedFunction {
        name,
        code: format!("function({}){}", params, body),
    })
}

/// Program evaluating only the located functions
pub fn build_snippet_program(player_js: &str) -> Result<String, RytError> {
    let sig = find_sig_function(player_js);
    let n = find_n_function(player_js);
    if sig.is_none() && n.is_none() {
        return Err(RytError::CipherError(
            "Neither signature nor n function found".to_string(),
        ));
    }

    let mut program = String::from(PRELUDE);
    if let Some(sig) = &sig {
        if let Some(helper) = find_sig_helper(player_js, &sig.code) {
            program.push_str(&helper);
            program.push('\n');
        }
        program.push_str(&format!("var {}={};\n", SIG_ENTRY, sig.code));
    }
    if let Some(n) = &n {
        program.push_str(&format!("var {}={};\n", NSIG_ENTRY, n.code));
    }
    Ok(program)
}

/// Program evaluating the whole player script with the located functions
/// exported from inside the player's closure
pub fn build_full_script_program(player_js: &str) -> Result<String, RytError> {
    let mut exports = String::new();
    if let Some(sig) = find_sig_function(player_js) {
        exports.push_str(&format!(";globalThis.{}={};", SIG_ENTRY, sig.name));
    }
    if let Some(name) = find_n_function_name(player_js) {
        exports.push_str(&format!(";globalThis.{}={};", NSIG_ENTRY, name));
    }
    if exports.is_empty() {
        return Err(RytError::CipherError(
            "Neither signature nor n function found".to_string(),
        ));
    }

    let mut program = String::with_capacity(PRELUDE.len() + player_js.len() + exports.len());
    program.push_str(PRELUDE);
    match player_js.rfind("})(_yt_player);") {
        Some(close) => {
            program.push_str(&player_js[..close]);
            program.push_str(&exports);
            program.push_str(&player_js[close..]);
        }
        None => {
            program.push_str(player_js);
            program.push_str(&exports);
        }
    }
    Ok(program)
}

#[derive(Debug, Clone, Copy)]
enum EntryPoint {
    Sig,
    NSig,
}

impl EntryPoint {
    fn name(&self) -> &'static str {
        match self {
            EntryPoint::Sig => SIG_ENTRY,
            EntryPoint::NSig => NSIG_ENTRY,
        }
    }
}

struct Job {
    entry: EntryPoint,
    input: String,
    reply: oneshot::Sender<Result<String, RytError>>,
}

/// V8 backed [`RuleEvaluator`].
///
/// `JsRuntime` is bound to the thread that created it, so each evaluator owns
/// a dedicated thread and serves calls from a queue. The thread exits when
/// the evaluator is dropped.
pub struct DenoEvaluator {
    jobs: mpsc::UnboundedSender<Job>,
}

impl DenoEvaluator {
    /// Start the evaluator thread and load the player script
    pub async fn spawn(player_js: Arc<str>, mode: EvaluatorMode) -> Result<Self, RytError> {
        let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<Job>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), RytError>>();

        std::thread::Builder::new()
            .name("rule-evaluator".to_string())
            .spawn(move || {
                let program = match mode {
                    EvaluatorMode::Snippet => build_snippet_program(&player_js),
                    EvaluatorMode::FullScript => build_full_script_program(&player_js),
                };
                let program = match program {
                    Ok(program) => program,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut runtime = JsRuntime::new(RuntimeOptions::default());
                if let Err(e) = runtime.execute_script("<player>", FastString::from(program)) {
                    let _ = ready_tx.send(Err(RytError::EvaluatorError(format!(
                        "Player script execution error: {:?}",
                        e
                    ))));
                    return;
                }
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                while let Some(job) = jobs_rx.blocking_recv() {
                    let result = call_entry(&mut runtime, job.entry, &job.input);
                    let _ = job.reply.send(result);
                }
                debug!("Rule evaluator stopped");
            })?;

        ready_rx
            .await
            .map_err(|_| RytError::EvaluatorError("Rule evaluator exited during startup".to_string()))??;
        debug!("Rule evaluator ready ({:?})", mode);

        Ok(Self { jobs: jobs_tx })
    }

    async fn call(&self, entry: EntryPoint, input: &str) -> Result<String, RytError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.jobs
            .send(Job {
                entry,
                input: input.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| RytError::EvaluatorError("Rule evaluator is not running".to_string()))?;

        let output = reply_rx
            .await
            .map_err(|_| RytError::EvaluatorError("Rule evaluator dropped the call".to_string()))??;
        if output.is_empty() {
            return Err(RytError::EvaluatorError(format!(
                "{} returned an empty result",
                entry.name()
            )));
        }
        Ok(output)
    }
}

fn call_entry(runtime: &mut JsRuntime, entry: EntryPoint, input: &str) -> Result<String, RytError> {
    let literal = serde_json::to_string(input)?;
    let call_code = format!("String({}({}))", entry.name(), literal);

    let result = runtime
        .execute_script("<call>", FastString::from(call_code))
        .map_err(|e| RytError::EvaluatorError(format!("{} call error: {:?}", entry.name(), e)))?;

    let scope = &mut runtime.handle_scope();
    let local = v8::Local::new(scope, result);
    Ok(local.to_rust_string_lossy(scope))
}

#[async_trait]
impl RuleEvaluator for DenoEvaluator {
    async fn extract_sig(&self, input: &str) -> Result<String, RytError> {
        self.call(EntryPoint::Sig, input).await
    }

    async fn extract_n_sig(&self, input: &str) -> Result<String, RytError> {
        self.call(EntryPoint::NSig, input).await
    }
}
