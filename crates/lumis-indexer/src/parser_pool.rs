//! Pool of tree-sitter parser threads
//!
//! `Parser` is neither Send nor Sync, so each worker thread owns its parsers
//! (one per grammar, created on first use) and jobs reach it over a shared
//! queue. Replies come back on a oneshot channel, so async callers never
//! block a runtime thread.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use tokio::sync::oneshot;
use tree_sitter::{Parser, Tree};

use crate::languages::Grammar;

#[derive(Debug)]
pub struct ParseRequest {
    pub grammar: Grammar,
    pub content: String,
}

/// The syntax tree together with the text it was parsed from.
#[derive(Debug)]
pub struct ParseResult {
    pub tree: Tree,
    pub content: String,
}

struct Job {
    request: ParseRequest,
    reply: oneshot::Sender<Result<ParseResult>>,
}

type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

#[derive(Clone)]
pub struct ParserPool {
    jobs: mpsc::Sender<Job>,
}

impl ParserPool {
    /// Start `workers` parser threads (at least one). They exit once every
    /// clone of the pool is dropped.
    pub fn new(workers: usize) -> Self {
        let (jobs, queue) = mpsc::channel::<Job>();
        let queue: JobQueue = Arc::new(Mutex::new(queue));
        for id in 0..workers.max(1) {
            let queue = queue.clone();
            std::thread::spawn(move || run_worker(id, queue));
        }
        Self { jobs }
    }

    pub async fn parse(&self, request: ParseRequest) -> Result<ParseResult> {
        self.submit(request)?
            .await
            .map_err(|_| anyhow!("parser worker dropped the job"))?
    }

    /// Blocking variant for synchronous callers. Must not be called from
    /// inside an async runtime.
    pub fn parse_blocking(&self, request: ParseRequest) -> Result<ParseResult> {
        self.submit(request)?
            .blocking_recv()
            .map_err(|_| anyhow!("parser worker dropped the job"))?
    }

    fn submit(&self, request: ParseRequest) -> Result<oneshot::Receiver<Result<ParseResult>>> {
        let (reply, receiver) = oneshot::channel();
        self.jobs
            .send(Job { request, reply })
            .map_err(|_| anyhow!("parser pool is shut down"))?;
        Ok(receiver)
    }
}

fn run_worker(id: usize, queue: JobQueue) {
    tracing::debug!("Parser worker {} started", id);
    let mut parsers: HashMap<Grammar, Parser> = HashMap::new();

    loop {
        let next = match queue.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };
        let Ok(Job { request, reply }) = next else {
            break;
        };
        // The caller may have gone away; nothing to report then.
        let _ = reply.send(parse_with(&mut parsers, request));
    }
    tracing::debug!("Parser worker {} stopped", id);
}

fn parse_with(parsers: &mut HashMap<Grammar, Parser>, request: ParseRequest) -> Result<ParseResult> {
    let grammar = request.grammar;
    let parser = match parsers.entry(grammar) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            let mut parser = Parser::new();
            parser
                .set_language(&grammar.tree_sitter_language())
                .map_err(|e| anyhow!("cannot load {} grammar: {}", grammar.name(), e))?;
            entry.insert(parser)
        }
    };
    let tree = parser
        .parse(&request.content, None)
        .ok_or_else(|| anyhow!("{} parser produced no tree", grammar.name()))?;
    Ok(ParseResult {
        tree,
        content: request.content,
    })
}

/// Pool sized to the machine, with at least two workers.
pub fn create_parser_pool() -> ParserPool {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2);
    ParserPool::new(workers)
}
