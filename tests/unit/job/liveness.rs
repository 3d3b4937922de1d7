use super::*;

#[derive(Default)]
struct Counting {
    fail: bool,
    acquired: u32,
    released: u32,
}

impl KeepAlive for Counting {
    fn acquire(&mut self) -> ReelResult<()> {
        if self.fail {
            return Err(ReelError::capability("no wake lock here"));
        }
        self.acquired += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.released += 1;
    }
}

#[test]
fn guard_releases_on_drop() {
    let mut k = Counting::default();
    {
        let guard = KeepAliveGuard::acquire(&mut k);
        assert!(guard.is_held());
    }
    assert_eq!(k.acquired, 1);
    assert_eq!(k.released, 1);
}

#[test]
fn guard_releases_on_early_return() {
    fn work(k: &mut dyn KeepAlive) -> ReelResult<()> {
        let _guard = KeepAliveGuard::acquire(k);
        Err(ReelError::Cancelled)
    }
    let mut k = Counting::default();
    assert!(work(&mut k).is_err());
    assert_eq!(k.released, 1);
}

#[test]
fn failed_acquire_is_not_fatal() {
    let mut k = Counting {
        fail: true,
        ..Counting::default()
    };
    let guard = KeepAliveGuard::acquire(&mut k);
    assert!(!guard.is_held());
    drop(guard);
    assert_eq!(k.acquired, 0);
}

#[test]
fn process_keep_alive_release_is_idempotent() {
    let mut k = ProcessKeepAlive::new();
    k.release();
    k.release();
    assert!(k.children.is_empty());
}
