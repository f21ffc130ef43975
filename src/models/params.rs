//! # 参数向量
//!
//! 有序的具名标量，附带平行的自由/固定标记与下界。
//! 不变式：`names`、`values`、`is_free`、`lower` 长度始终相等；
//! `set_free_values` 只写入自由参数。

use crate::error::{PawleyError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterVector {
    names: Vec<String>,
    values: Vec<f64>,
    is_free: Vec<bool>,
    lower: Vec<f64>,
}

impl ParameterVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个参数，返回其下标
    pub fn push(&mut self, name: impl Into<String>, value: f64, free: bool, lower: f64) -> usize {
        self.names.push(name.into());
        self.values.push(value);
        self.is_free.push(free);
        self.lower.push(lower);
        self.values.len() - 1
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_free(&self) -> &[bool] {
        &self.is_free
    }

    pub fn nfree(&self) -> usize {
        self.is_free.iter().filter(|f| **f).count()
    }

    pub fn set_free(&mut self, index: usize, free: bool) {
        if let Some(flag) = self.is_free.get_mut(index) {
            *flag = free;
        }
    }

    pub fn set_value(&mut self, index: usize, value: f64) {
        if let Some(v) = self.values.get_mut(index) {
            *v = value;
        }
    }

    pub fn set_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.len() {
            return Err(PawleyError::ConfigurationError(format!(
                "Expected {} parameters, got {}",
                self.len(),
                values.len()
            )));
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    pub fn free_values(&self) -> Vec<f64> {
        self.select_free(&self.values)
    }

    pub fn free_lower(&self) -> Vec<f64> {
        self.select_free(&self.lower)
    }

    fn select_free(&self, source: &[f64]) -> Vec<f64> {
        source
            .iter()
            .zip(&self.is_free)
            .filter(|(_, free)| **free)
            .map(|(v, _)| *v)
            .collect()
    }

    /// 用自由参数替换当前值中的自由位，得到完整向量（不修改自身）
    pub fn merge_free(&self, free_values: &[f64]) -> Result<Vec<f64>> {
        let nfree = self.nfree();
        if free_values.len() != nfree {
            return Err(PawleyError::ConfigurationError(format!(
                "Expected {} free parameters, got {}",
                nfree,
                free_values.len()
            )));
        }
        let mut free_iter = free_values.iter();
        Ok(self
            .values
            .iter()
            .zip(&self.is_free)
            .map(|(v, free)| {
                if *free {
                    free_iter.next().copied().unwrap_or(*v)
                } else {
                    *v
                }
            })
            .collect())
    }

    pub fn set_free_values(&mut self, free_values: &[f64]) -> Result<()> {
        self.values = self.merge_free(free_values)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParameterVector {
        let mut p = ParameterVector::new();
        p.push("I0", 1.0, true, 0.0);
        p.push("a", 5.4, false, 0.0);
        p.push("I1", 2.0, true, 0.0);
        p
    }

    #[test]
    fn test_lengths_stay_parallel() {
        let p = sample();
        assert_eq!(p.len(), 3);
        assert_eq!(p.names().len(), p.is_free().len());
        assert_eq!(p.nfree(), 2);
        assert_eq!(p.free_values(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_set_free_values_skips_fixed() {
        let mut p = sample();
        p.set_free_values(&[7.0, 8.0]).unwrap();
        assert_eq!(p.values(), &[7.0, 5.4, 8.0]);
        assert!(p.set_free_values(&[1.0]).is_err());
        assert!(p.set_values(&[1.0, 2.0]).is_err());
    }
}
