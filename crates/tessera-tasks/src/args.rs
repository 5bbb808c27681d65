// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Inputs of awaitable tasks.
//!
//! An awaitable task receives its inputs as a [`TaskArgs`] value: a single
//! [`TaskFuture`], a `Vec` of inputs, or a tuple (up to six elements) of
//! [`TaskArg`]s. Plain values are mixed in with [`Ready`].

use crate::error::TaskError;
use crate::future::TaskFuture;

/// One input of an awaitable task.
pub trait TaskArg {
    /// The value handed to the task body.
    type Output;

    /// Non-blocking readiness check.
    fn is_ready(&self) -> bool;

    /// Produces the value, waiting if necessary.
    fn resolve(self) -> Result<Self::Output, TaskError>;
}

/// An already available input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ready<T>(pub T);

impl<T> TaskArg for Ready<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        true
    }

    fn resolve(self) -> Result<T, TaskError> {
        Ok(self.0)
    }
}

impl<T: Clone> TaskArg for TaskFuture<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        TaskFuture::is_ready(self)
    }

    fn resolve(self) -> Result<T, TaskError> {
        self.get()
    }
}

impl<A: TaskArg> TaskArg for Vec<A> {
    type Output = Vec<A::Output>;

    fn is_ready(&self) -> bool {
        self.iter().all(TaskArg::is_ready)
    }

    fn resolve(self) -> Result<Self::Output, TaskError> {
        self.into_iter().map(TaskArg::resolve).collect()
    }
}

/// The complete input list of an awaitable task.
pub trait TaskArgs {
    /// What the task body receives.
    type Output;

    /// `true` when every input is ready.
    fn is_ready(&self) -> bool;

    /// Resolves every input, stopping at the first failure.
    fn resolve(self) -> Result<Self::Output, TaskError>;
}

impl TaskArgs for () {
    type Output = ();

    fn is_ready(&self) -> bool {
        true
    }

    fn resolve(self) -> Result<(), TaskError> {
        Ok(())
    }
}

impl<T: Clone> TaskArgs for TaskFuture<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        TaskArg::is_ready(self)
    }

    fn resolve(self) -> Result<T, TaskError> {
        TaskArg::resolve(self)
    }
}

impl<A: TaskArg> TaskArgs for Vec<A> {
    type Output = Vec<A::Output>;

    fn is_ready(&self) -> bool {
        TaskArg::is_ready(self)
    }

    fn resolve(self) -> Result<Self::Output, TaskError> {
        TaskArg::resolve(self)
    }
}

macro_rules! impl_task_args_for_tuple {
    ($($arg:ident),+) => {
        impl<$($arg: TaskArg),+> TaskArgs for ($($arg,)+) {
            type Output = ($($arg::Output,)+);

            #[allow(non_snake_case)]
            fn is_ready(&self) -> bool {
                let ($($arg,)+) = self;
                $($arg.is_ready())&&+
            }

            #[allow(non_snake_case)]
            fn resolve(self) -> Result<Self::Output, TaskError> {
                let ($($arg,)+) = self;
                Ok(($($arg.resolve()?,)+))
            }
        }
    };
}

impl_task_args_for_tuple!(A);
impl_task_args_for_tuple!(A, B);
impl_task_args_for_tuple!(A, B, C);
impl_task_args_for_tuple!(A, B, C, D);
impl_task_args_for_tuple!(A, B, C, D, E);
impl_task_args_for_tuple!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::make_ready_task;

    #[test]
    fn test_ready_values_are_always_ready() {
        let args = (Ready(1), Ready("two"));
        assert!(TaskArgs::is_ready(&args));
        assert_eq!(TaskArgs::resolve(args), Ok((1, "two")));
    }

    #[test]
    fn test_tuple_is_ready_only_when_every_future_is() {
        let (task, future) = make_ready_task(|| 5u8);
        let args = (Ready(1u8), future);
        assert!(!TaskArgs::is_ready(&args));
        task.run();
        assert!(TaskArgs::is_ready(&args));
        assert_eq!(TaskArgs::resolve(args), Ok((1, 5)));
    }

    #[test]
    fn test_empty_vec_is_ready() {
        let inputs: Vec<TaskFuture<u8>> = Vec::new();
        assert!(TaskArgs::is_ready(&inputs));
        assert_eq!(TaskArgs::resolve(inputs), Ok(vec![]));
    }
}
