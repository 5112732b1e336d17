//! Reactor seam
//!
//! The async connection does not own an event loop. It talks to one through
//! the [`Reactor`] trait, and the event loop calls back into the connection
//! when its transport becomes readable or writable.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::Rc;

/// Identifies one registration with a reactor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub usize);

/// Readiness a registration is watching for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interest {
    pub readable: bool,
    pub writable: bool,
}

impl Interest {
    pub const READABLE: Interest = Interest {
        readable: true,
        writable: false,
    };

    pub const WRITABLE: Interest = Interest {
        readable: false,
        writable: true,
    };

    pub const READ_WRITE: Interest = Interest {
        readable: true,
        writable: true,
    };

    /// Union of two interest sets
    pub fn add(self, other: Interest) -> Interest {
        Interest {
            readable: self.readable || other.readable,
            writable: self.writable || other.writable,
        }
    }

    /// `self` without anything in `other`
    pub fn remove(self, other: Interest) -> Interest {
        Interest {
            readable: self.readable && !other.readable,
            writable: self.writable && !other.writable,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.readable && !self.writable
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.readable, self.writable) {
            (true, true) => f.write_str("{read,write}"),
            (true, false) => f.write_str("{read}"),
            (false, true) => f.write_str("{write}"),
            (false, false) => f.write_str("{}"),
        }
    }
}

/// An externally owned event loop that watches sources for readiness
///
/// Implementations translate these calls into their native registration
/// API; `S` is the I/O source the loop needs to watch.
pub trait Reactor<S: ?Sized> {
    /// Start watching `source` under `token`
    fn register(&mut self, source: &S, token: Token, interest: Interest) -> io::Result<()>;

    /// Replace the interest set of an existing registration
    fn reregister(&mut self, source: &S, token: Token, interest: Interest) -> io::Result<()>;

    /// Stop watching `source`
    fn deregister(&mut self, source: &S, token: Token) -> io::Result<()>;
}

impl<S: ?Sized, R: Reactor<S> + ?Sized> Reactor<S> for &mut R {
    fn register(&mut self, source: &S, token: Token, interest: Interest) -> io::Result<()> {
        (**self).register(source, token, interest)
    }

    fn reregister(&mut self, source: &S, token: Token, interest: Interest) -> io::Result<()> {
        (**self).reregister(source, token, interest)
    }

    fn deregister(&mut self, source: &S, token: Token) -> io::Result<()> {
        (**self).deregister(source, token)
    }
}

/// Shared single-threaded reactor, so the event loop and its connections can
/// both hold it
impl<S: ?Sized, R: Reactor<S> + ?Sized> Reactor<S> for Rc<RefCell<R>> {
    fn register(&mut self, source: &S, token: Token, interest: Interest) -> io::Result<()> {
        self.borrow_mut().register(source, token, interest)
    }

    fn reregister(&mut self, source: &S, token: Token, interest: Interest) -> io::Result<()> {
        self.borrow_mut().reregister(source, token, interest)
    }

    fn deregister(&mut self, source: &S, token: Token) -> io::Result<()> {
        self.borrow_mut().deregister(source, token)
    }
}
