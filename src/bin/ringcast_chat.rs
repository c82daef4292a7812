// Interactive relay: shuttles bytes between stdin/stdout and a channel.
// Lines typed here are broadcast to every session on the same identity;
// everything written to the channel (own lines included) comes back out.

use std::env;
use std::io::{self, BufRead, Write};
use std::thread;

use ringcast::Broadcast::{Session, RING_CAPACITY};

fn main() -> io::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} IDENTITY", args[0]);
        std::process::exit(1);
    }
    let identity = &args[1];

    let session = Session::open(identity)?;
    let reader = session.try_clone()?;
    let interrupter = session.interrupter()?;

    // Handle Ctrl+C: abort the blocked read below and bail out
    let ctrlc_interrupter = interrupter.clone();
    ctrlc::set_handler(move || {
        ctrlc_interrupter.interrupt();
    })
    .expect("Error setting Ctrl+C handler");

    println!("Connected to {:?}. Type lines to broadcast; Ctrl+D to leave.", identity);

    let pump = thread::spawn(move || {
        let mut buf = [0u8; RING_CAPACITY];
        let stdout = io::stdout();
        loop {
            match reader.read(&mut buf) {
                Ok(count) => {
                    let mut out = stdout.lock();
                    if out.write_all(&buf[..count]).and_then(|_| out.flush()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => break,
                Err(e) => {
                    eprintln!("ringcast: {}", e);
                    break;
                }
            }
        }
    });

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let mut line = line?;
        line.push('\n');
        match session.write_all(line.as_bytes()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => break,
            Err(e) => {
                eprintln!("ringcast: {}", e);
                break;
            }
        }
    }

    // stdin closed (or write aborted): unblock the pump thread and leave
    interrupter.interrupt();
    pump.join().expect("reader thread panicked");

    Ok(())
}
