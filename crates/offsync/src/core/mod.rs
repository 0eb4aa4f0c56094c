pub mod pending_queue;

#[cfg(test)]
mod pending_queue_pbt;

pub use pending_queue::PendingQueue;
