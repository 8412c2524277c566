//! 自然序排序：路径中嵌入的整数按数值而非字典序比较。

use std::cmp::Ordering;

/// 路径字符串的一个片段：连续数字或连续非数字。
#[derive(Debug, Eq, PartialEq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let is_digit = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != is_digit)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        if is_digit {
            Some(Chunk::Digits(head))
        } else {
            Some(Chunk::Text(head))
        }
    }
}

/// 任意长度数字串按数值比较，不会溢出。
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        // 数值相同时前导零少的在前，保证全序
        .then_with(|| a.len().cmp(&b.len()))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    let lower = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    lower.then_with(|| a.cmp(b))
}

/// 自然序比较。数字片段按整数值比较，文本片段忽略大小写比较。
///
/// 数字片段总是排在文本片段之前。
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut lhs = Chunks { rest: a };
    let mut rhs = Chunks { rest: b };
    loop {
        let ord = match (lhs.next(), rhs.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(x)), Some(Chunk::Digits(y))) => cmp_digits(x, y),
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => cmp_text(x, y),
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// 返回按自然序排好的新列表，不修改输入。排序稳定。
pub fn natural_sorted<I, S>(items: I) -> Vec<S>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut v: Vec<S> = items.into_iter().collect();
    v.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
    v
}

/// 将一个字符串中出现的第一段数字解析为整数。
///
/// 用于从文件名推导受试者编号，例如`subject-10-label.nii`得到`10`。
pub fn first_number(s: &str) -> Option<u64> {
    Chunks { rest: s }.find_map(|c| match c {
        Chunk::Digits(d) => d.parse().ok(),
        Chunk::Text(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_by_value() {
        let sorted = natural_sorted(["img_2.npy", "img_10.npy", "img_1.npy"]);
        assert_eq!(sorted, ["img_1.npy", "img_2.npy", "img_10.npy"]);
    }

    #[test]
    fn directories_compare_by_value() {
        let sorted = natural_sorted(vec![
            "/data/10/T1.nii".to_string(),
            "/data/2/T1.nii".to_string(),
            "/data/1/T1.nii".to_string(),
        ]);
        assert_eq!(sorted, ["/data/1/T1.nii", "/data/2/T1.nii", "/data/10/T1.nii"]);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = vec!["b2", "b10", "a"];
        let sorted = natural_sorted(input.iter());
        assert_eq!(sorted, [&"a", &"b2", &"b10"]);
        assert_eq!(input, ["b2", "b10", "a"]);
    }

    #[test]
    fn case_insensitive_text() {
        let sorted = natural_sorted(["B1", "a2", "a1"]);
        assert_eq!(sorted, ["a1", "a2", "B1"]);
    }

    #[test]
    fn leading_zeros_and_huge_numbers() {
        assert_eq!(natural_cmp("x007", "x7"), Ordering::Greater);
        assert_eq!(natural_cmp("x8", "x007"), Ordering::Greater);
        let big = format!("s{}", "9".repeat(30));
        let bigger = format!("s1{}", "0".repeat(30));
        assert_eq!(natural_cmp(&big, &bigger), Ordering::Less);
    }

    #[test]
    fn image_and_label_lists_stay_aligned() {
        let images = natural_sorted(["s-3-T1.nii", "s-11-T1.nii", "s-1-T1.nii"]);
        let labels = natural_sorted(["s-11-label.nii", "s-1-label.nii", "s-3-label.nii"]);
        for (i, l) in images.iter().zip(labels.iter()) {
            assert_eq!(first_number(i), first_number(l));
        }
    }

    #[test]
    fn first_number_of_name() {
        assert_eq!(first_number("subject-10-label.nii"), Some(10));
        assert_eq!(first_number("label.nii"), None);
    }
}
