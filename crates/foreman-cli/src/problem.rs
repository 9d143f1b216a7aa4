use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use foreman_compute::error::{ComputeError, ComputeResult};
use foreman_compute::problem::Problem;
use foreman_compute::worker::PartialSolver;

/// A half-open range of candidates for one work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub lo: u64,
    pub hi: u64,
}

/// Counts the primes below a bound by splitting the range into chunks and
/// summing the per-chunk counts.
pub struct PrimeCountProblem {
    next: u64,
    end: u64,
    chunk_size: u64,
    produced: u64,
    collected: u64,
    count: u64,
}

impl PrimeCountProblem {
    pub fn new(end: u64, chunk_size: u64) -> Self {
        Self {
            next: 0,
            end,
            chunk_size: chunk_size.max(1),
            produced: 0,
            collected: 0,
            count: 0,
        }
    }
}

impl Problem for PrimeCountProblem {
    fn produce_next_item(&mut self, _suggested_batch_size: usize) -> ComputeResult<Option<Vec<u8>>> {
        if self.next >= self.end {
            return Ok(None);
        }
        let chunk = Chunk {
            lo: self.next,
            hi: (self.next + self.chunk_size).min(self.end),
        };
        self.next = chunk.hi;
        self.produced += 1;
        serde_json::to_vec(&chunk)
            .map(Some)
            .map_err(|e| ComputeError::InternalError(e.to_string()))
    }

    fn collect_result(&mut self, result: Vec<u8>, _item: &[u8]) -> ComputeResult<()> {
        let count: u64 = serde_json::from_slice(&result)
            .map_err(|e| ComputeError::InvalidArgument(e.to_string()))?;
        self.collected += 1;
        self.count += count;
        Ok(())
    }

    fn final_result_if_ready(&mut self) -> Option<Vec<u8>> {
        if self.next >= self.end && self.collected == self.produced {
            serde_json::to_vec(&self.count).ok()
        } else {
            None
        }
    }
}

/// Counts the primes in an assigned chunk by trial division.
pub struct PrimeSolver;

#[async_trait]
impl PartialSolver for PrimeSolver {
    async fn solve(&self, item: Vec<u8>) -> ComputeResult<Vec<u8>> {
        let chunk: Chunk = serde_json::from_slice(&item)
            .map_err(|e| ComputeError::InvalidArgument(e.to_string()))?;
        let count = (chunk.lo..chunk.hi).filter(|&n| is_prime(n)).count() as u64;
        serde_json::to_vec(&count).map_err(|e| ComputeError::InternalError(e.to_string()))
    }
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prime() {
        let primes: Vec<u64> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn test_problem_produces_covering_chunks() {
        let mut problem = PrimeCountProblem::new(25, 10);
        let mut chunks = vec![];
        while let Some(payload) = problem.produce_next_item(4).unwrap() {
            chunks.push(serde_json::from_slice::<Chunk>(&payload).unwrap());
        }
        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].lo, chunks[0].hi), (0, 10));
        assert_eq!((chunks[2].lo, chunks[2].hi), (20, 25));
    }

    #[tokio::test]
    async fn test_problem_and_solver_agree() {
        let mut problem = PrimeCountProblem::new(100, 30);
        let solver = PrimeSolver;
        loop {
            let Some(item) = problem.produce_next_item(1).unwrap() else {
                break;
            };
            let result = solver.solve(item.clone()).await.unwrap();
            problem.collect_result(result, &item).unwrap();
        }
        let out = problem.final_result_if_ready().unwrap();
        // There are 25 primes below 100.
        assert_eq!(serde_json::from_slice::<u64>(&out).unwrap(), 25);
    }
}
