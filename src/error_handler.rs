use crate::input::Error;
use crate::process::Failure;

use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

// Bad rows and failed operations do not stop the batch: they are logged and
// counted, and processing carries on with the next row. A row that failed
// left nothing behind (each operation is atomic), so the batch can be fixed
// and only the failed rows replayed.
//
// Each handle yields how many errors its channel carried.
pub fn sink(input_errors: Receiver<Error>, failures: Receiver<Failure>) -> Vec<JoinHandle<usize>> {
    vec![
        std::thread::spawn(move || {
            let mut count = 0;
            for err in input_errors {
                tracing::warn!(error = %err, "skipped batch row");
                count += 1;
            }
            count
        }),
        std::thread::spawn(move || {
            let mut count = 0;
            for failure in failures {
                tracing::warn!(command = ?failure.command, error = %failure.error, "operation failed");
                count += 1;
            }
            count
        }),
    ]
}
