use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

/// A pre-scripted server: reads are served from a fixed buffer, writes land in a shared sink the
/// test keeps a handle to after the transport itself is moved into a `Session`. Good enough to
/// drive the session engine through a whole exchange without a real socket.
pub struct Scripted {
  incoming: io::Cursor<Vec<u8>>,
  outgoing: Rc<RefCell<Vec<u8>>>,
}

impl Scripted {
  pub fn new(script: &str) -> (Self, Rc<RefCell<Vec<u8>>>) {
    let outgoing = Rc::new(RefCell::new(Vec::new()));
    (Scripted { incoming: io::Cursor::new(script.as_bytes().to_vec()), outgoing: outgoing.clone() }, outgoing)
  }
}

pub fn sent(outgoing: &Rc<RefCell<Vec<u8>>>) -> String {
  String::from_utf8(outgoing.borrow().clone()).unwrap()
}

impl Read for Scripted {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.incoming.read(buf)
  }
}

impl Write for Scripted {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.outgoing.borrow_mut().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
