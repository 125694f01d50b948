// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::{
    sync::Arc,
    thread::{
        self,
        JoinHandle,
    },
};

use crossbeam_channel::{
    Receiver,
    Sender,
};
use log::{
    debug,
    error,
};

use super::{
    environment::Shared,
    ErrorImpl,
};
use crate::backend::common::KeyRange;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub(crate) enum Job {
    Flush,
    Compact,
    Shutdown,
}

/// The thread that runs flushes and compactions off the caller's thread.
#[derive(Debug)]
pub(crate) struct Worker {
    sender: Sender<Job>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(shared: Arc<Shared>, sender: Sender<Job>, receiver: Receiver<Job>) -> Result<Worker, ErrorImpl> {
        let handle = thread::Builder::new().name("orderkv-worker".into()).spawn(move || run(&shared, &receiver))?;
        Ok(Worker {
            sender,
            handle: Some(handle),
        })
    }

    /// Finish queued jobs and stop. Jobs scheduled afterwards are refused.
    pub(crate) fn shutdown(&mut self) {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return,
        };
        if self.sender.send(Job::Shutdown).is_err() {
            debug!("Background worker already stopped");
        }
        if handle.join().is_err() {
            error!("Background worker panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared, receiver: &Receiver<Job>) {
    for job in receiver.iter() {
        let result = match job {
            Job::Flush => shared.flush_now(false),
            Job::Compact => shared.compact_now(KeyRange::all()),
            Job::Shutdown => break,
        };
        if let Err(e) = result {
            shared.record_background_error(&e);
        }
    }
    debug!("Background worker stopped");
}
