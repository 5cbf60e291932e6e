pub mod worker_loop;
