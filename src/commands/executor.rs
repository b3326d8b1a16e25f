//! Command Executor
//!
//! Turns one input line into one [`ResultTree`]:
//!
//! ```text
//! "HSET user:1 name 'Ariz K'"
//!       │ split_args
//!       ▼
//! ["HSET", "user:1", "name", "Ariz K"]
//!       │ table lookup ── UnknownCommand
//!       │ arity check ─── WrongArity
//!       │ access check ── ReadOnly
//!       ▼
//! handler(connection, args, output) ── error recorded on the tree
//! ```
//!
//! Every check before the handler runs is free of backend calls. The executor always
//! returns a tree; failures are recorded with [`ResultTree::set_error`] and any output
//! the handler attached before failing stays in place.

use crate::commands::table::{Access, Output};
use crate::config::args::split_args;
use crate::connection::{Backend, Connection};
use crate::error::{Error, Result};
use crate::tree::{ResultTree, TreeObserver};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Runs command lines against one connection.
pub struct Executor<B: Backend> {
    connection: Connection<B>,
    observer: Option<Arc<dyn TreeObserver>>,
}

impl<B: Backend> Executor<B> {
    pub fn new(connection: Connection<B>) -> Self {
        Self {
            connection,
            observer: None,
        }
    }

    /// Every tree produced by this executor reports to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn TreeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn connection(&self) -> &Connection<B> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection<B> {
        &mut self.connection
    }

    pub fn into_connection(self) -> Connection<B> {
        self.connection
    }

    /// Executes `line`, returning its result tree.
    ///
    /// ```
    /// use kvbridge::backends::Memory;
    /// use kvbridge::config::MemoryConfig;
    /// use kvbridge::{Connection, Executor, Value};
    ///
    /// let conn = Connection::<Memory>::open(MemoryConfig::default()).unwrap();
    /// let mut executor = Executor::new(conn);
    ///
    /// executor.execute("SET greeting 'hello world'");
    /// let tree = executor.execute("get greeting");
    /// assert!(tree.is_ok());
    /// assert_eq!(tree.outputs().next(), Some(&Value::string("hello world")));
    /// ```
    pub fn execute(&mut self, line: &str) -> ResultTree {
        let mut tree = ResultTree::new(line, self.observer.clone());
        if let Err(e) = self.dispatch(line, &mut tree) {
            debug!(backend = %B::KIND, line = %line, error = %e, "Command failed");
            tree.set_error(e);
        }
        tree
    }

    fn dispatch(&mut self, line: &str, tree: &mut ResultTree) -> Result<()> {
        let tokens = split_args(line).map_err(|e| Error::Syntax(e.to_string()))?;
        let (name, args) = tokens
            .split_first()
            .ok_or_else(|| Error::UnknownCommand(String::new()))?;

        let command = B::commands()
            .get(name)
            .ok_or_else(|| Error::UnknownCommand(name.clone()))?;

        if !command.arity.accepts(args.len()) {
            return Err(Error::WrongArity {
                command: command.name.to_string(),
                got: args.len(),
            });
        }
        if command.access == Access::Write && self.connection.is_read_only() {
            return Err(Error::ReadOnly(command.name.to_string()));
        }

        debug!(
            backend = %B::KIND,
            command = command.name,
            args = args.len(),
            "Dispatching command"
        );

        let root = tree.root();
        let delimiter = self.connection.delimiter().to_string();
        let mut out = Output::new(tree, root, delimiter);
        (command.handler)(&mut self.connection, args, &mut out)
    }
}

impl<B: Backend> fmt::Debug for Executor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("connection", &self.connection)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}
