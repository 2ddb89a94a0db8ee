use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use ulid::Ulid;

/// Bookable hours per tutor per day: one window 00:00-23:00.
const HOURS_PER_DAY: usize = 23;

struct Client {
    framed: Framed<TcpStream, LinesCodec>,
}

impl Client {
    async fn connect(host: &str, port: u16) -> Self {
        let socket = TcpStream::connect((host, port)).await.expect("connect failed");
        Self {
            framed: Framed::new(socket, LinesCodec::new()),
        }
    }

    async fn call(&mut self, request: Value) -> Value {
        self.framed.send(request.to_string()).await.expect("send failed");
        let line = self
            .framed
            .next()
            .await
            .expect("server closed connection")
            .expect("read failed");
        let reply: Value = serde_json::from_str(&line).expect("invalid reply");
        assert_eq!(reply["ok"], true, "request failed: {reply}");
        reply["data"].clone()
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
}

/// Date and start hour of the `i`th one-hour booking.
fn nth_hour(i: usize) -> (NaiveDate, usize) {
    let date = base_date() + Days::new((i / HOURS_PER_DAY) as u64);
    (date, i % HOURS_PER_DAY)
}

/// A tutor with full-day availability for `days` days and one student.
/// Returns (tutor_id, student_email).
async fn setup_pair(client: &mut Client, days: usize) -> (String, String) {
    let tag = Ulid::new().to_string().to_lowercase();
    let tutor = client
        .call(json!({
            "op": "register_tutor",
            "name": "Bench Tutor",
            "email": format!("tutor-{tag}@bench.local"),
            "hourly_rate": "45.00",
        }))
        .await;
    let tutor_id = tutor["id"].as_str().unwrap().to_string();
    let student_email = format!("student-{tag}@bench.local");
    client
        .call(json!({ "op": "register_student", "name": "Bench Student", "email": student_email }))
        .await;

    for d in 0..days {
        client
            .call(json!({
                "op": "add_availability",
                "tutor_id": tutor_id,
                "date": base_date() + Days::new(d as u64),
                "start": "00:00:00",
                "end": "23:00:00",
            }))
            .await;
    }
    (tutor_id, student_email)
}

/// Request and pay for the `i`th hour. Returns (request, confirm) latency.
async fn book_and_pay(client: &mut Client, tutor_id: &str, student: &str, i: usize) -> (Duration, Duration) {
    let (date, hour) = nth_hour(i);
    let t = Instant::now();
    let session = client
        .call(json!({
            "op": "request_session",
            "student_email": student,
            "tutor_id": tutor_id,
            "date": date,
            "start": format!("{hour:02}:00:00"),
            "end": format!("{:02}:00:00", hour + 1),
        }))
        .await;
    let requested = t.elapsed();

    let t = Instant::now();
    client
        .call(json!({
            "op": "confirm_payment",
            "student_email": student,
            "session_id": session["id"],
            "method": "CARD",
            "token": "tok_visa",
        }))
        .await;
    (requested, t.elapsed())
}

async fn phase1_sequential(host: &str, port: u16) {
    let mut client = Client::connect(host, port).await;
    let n = 1000;
    let (tutor_id, student) = setup_pair(&mut client, n.div_ceil(HOURS_PER_DAY)).await;

    let mut request_latencies = Vec::with_capacity(n);
    let mut confirm_latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let (r, c) = book_and_pay(&mut client, &tutor_id, &student, i).await;
        request_latencies.push(r);
        confirm_latencies.push(c);
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} paid bookings in {:.2}s = {ops:.0} bookings/sec", elapsed.as_secs_f64());
    print_latency("request_session latency", &mut request_latencies);
    print_latency("confirm_payment latency", &mut confirm_latencies);
}

async fn phase2_concurrent(host: &str, port: u16) {
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(&host, port).await;
            // Each task books its own tutor so schedules never contend.
            let (tutor_id, student) =
                setup_pair(&mut client, n_per_task.div_ceil(HOURS_PER_DAY)).await;
            for j in 0..n_per_task {
                book_and_pay(&mut client, &tutor_id, &student, j).await;
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} paid bookings = {total} total in {:.2}s = {ops:.0} bookings/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_contended_slot(host: &str, port: u16) {
    let n_students = 20;
    let mut setup = Client::connect(host, port).await;
    let (tutor_id, _) = setup_pair(&mut setup, 1).await;

    let mut handles = Vec::new();
    for s in 0..n_students {
        let host = host.to_string();
        let tutor_id = tutor_id.clone();
        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(&host, port).await;
            let email = format!("contender-{s}-{}@bench.local", Ulid::new().to_string().to_lowercase());
            client
                .call(json!({ "op": "register_student", "name": "Contender", "email": email }))
                .await;
            client
                .framed
                .send(
                    json!({
                        "op": "request_session",
                        "student_email": email,
                        "tutor_id": tutor_id,
                        "date": base_date(),
                        "start": "10:00:00",
                        "end": "11:00:00",
                    })
                    .to_string(),
                )
                .await
                .unwrap();
            let line = client.framed.next().await.unwrap().unwrap();
            let reply: Value = serde_json::from_str(&line).unwrap();
            reply["ok"] == true
        }));
    }

    let mut won = 0;
    for h in handles {
        if h.await.unwrap() {
            won += 1;
        }
    }
    println!("  {n_students} students raced for one slot: {won} session(s) created");
    assert_eq!(won, 1, "slot double-booked");
}

async fn phase4_read_under_load(host: &str, port: u16) {
    let mut setup = Client::connect(host, port).await;
    let (tutor_id, student) = setup_pair(&mut setup, 5).await;
    for i in 0..50 {
        book_and_pay(&mut setup, &tutor_id, &student, i).await;
    }

    // Writer tasks: continuously book and pay in the background
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let mut client = Client::connect(&host, port).await;
            let (tutor_id, student) = setup_pair(&mut client, 40).await;
            let mut i = 0;
            while !stop.load(std::sync::atomic::Ordering::Relaxed) && i < 40 * HOURS_PER_DAY {
                book_and_pay(&mut client, &tutor_id, &student, i).await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let host = host.to_string();
        let tutor_id = tutor_id.clone();
        reader_handles.push(tokio::spawn(async move {
            let mut client = Client::connect(&host, port).await;
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for r in 0..reads_per_reader {
                let (date, _) = nth_hour(r % 50);
                let t = Instant::now();
                client
                    .call(json!({ "op": "list_availability", "tutor_id": tutor_id, "date": date }))
                    .await;
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("availability query", &mut all_latencies);
}

#[tokio::main]
async fn main() {
    let host = std::env::var("TUTORBOOK_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("TUTORBOOK_PORT")
        .unwrap_or_else(|_| "5480".into())
        .parse()
        .expect("invalid TUTORBOOK_PORT");

    println!("=== tutorbook stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[phase 1] sequential request + confirm");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] concurrent request + confirm");
    phase2_concurrent(&host, port).await;

    println!("\n[phase 3] contended slot");
    phase3_contended_slot(&host, port).await;

    println!("\n[phase 4] read latency under write load");
    phase4_read_under_load(&host, port).await;

    println!("\n=== done ===");
}
